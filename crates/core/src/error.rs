//! Domain error model.

use thiserror::Error;

/// Result type used for boundary parsing across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error raised while turning loosely-typed input into domain values.
///
/// Business failures of the inventory core (cycles, shortfalls, ...) have their own
/// typed errors in `partforge-parts`; infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. blank).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
