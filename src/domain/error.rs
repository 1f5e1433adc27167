use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain entity `{entity}` not found")]
    NotFound { entity: &'static str },
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("domain invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
