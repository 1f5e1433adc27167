//! Total order over pages.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

/// Submitted order is not a permutation of the stored page set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("order does not match stored pages: {missing} missing, {unknown} unknown, {duplicated} duplicated")]
pub struct OrderMismatch {
    pub missing: usize,
    pub unknown: usize,
    pub duplicated: usize,
}

/// Check that `submitted` contains every id in `existing` exactly once.
pub fn validate_permutation(existing: &[Uuid], submitted: &[Uuid]) -> Result<(), OrderMismatch> {
    let known: HashSet<Uuid> = existing.iter().copied().collect();
    let mut seen = HashSet::with_capacity(submitted.len());
    let mut unknown = 0;
    let mut duplicated = 0;

    for id in submitted {
        if !known.contains(id) {
            unknown += 1;
        } else if !seen.insert(*id) {
            duplicated += 1;
        }
    }

    let missing = known.len() - seen.len();
    if missing == 0 && unknown == 0 && duplicated == 0 {
        Ok(())
    } else {
        Err(OrderMismatch {
            missing,
            unknown,
            duplicated,
        })
    }
}

/// Dense ranks `0..n-1` in submitted order.
pub fn ranks(ordered: &[Uuid]) -> impl Iterator<Item = (Uuid, i32)> + '_ {
    ordered.iter().copied().zip(0..)
}
