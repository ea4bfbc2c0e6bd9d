use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures of the learning domain rules themselves.
///
/// Storage and delivery failures have their own error types in the crates
/// that own those concerns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input: blank names, zero targets, unknown event tags.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Progress evaluated against the wrong institution, learner or template.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced template (or other record) does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
