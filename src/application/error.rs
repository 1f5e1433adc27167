use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

/// Caller-facing class of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input. Fix it and retry.
    Validation,
    NotFound,
    /// Stale view of stored state. Re-fetch before retrying.
    Conflict,
    /// Lost a race with another writer. Retry as is.
    Concurrency,
    Storage,
    Internal,
}

impl ErrorKind {
    pub fn of_repo(err: &RepoError) -> Self {
        match err {
            RepoError::Duplicate { .. } | RepoError::OrderMismatch(_) => ErrorKind::Conflict,
            RepoError::NotFound => ErrorKind::NotFound,
            RepoError::InvalidInput { .. } => ErrorKind::Validation,
            RepoError::Concurrency { .. } => ErrorKind::Concurrency,
            RepoError::Integrity { .. } | RepoError::Timeout | RepoError::Persistence(_) => {
                ErrorKind::Storage
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Process-level failure surfaced by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
