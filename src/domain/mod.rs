//! Domain layer types and invariants.

pub mod blocks;
pub mod entities;
pub mod error;
pub mod ordering;
pub mod pages;
pub mod slug;
pub mod types;
pub mod versions;
