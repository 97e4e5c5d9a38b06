//! # DomainError
//!
//! Centralized error handling for the board engine.
//! Maps domain-specific failures to actionable error types; adapters map
//! their own failures into `Internal`.

use thiserror::Error;

use crate::models::PostId;

/// The primary error type for all engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input (e.g., empty content, non-numeric page)
    #[error("validation error: {0}")]
    Validation(String),

    /// Input rejected on its merits (e.g., wrong captcha, untrusted image host)
    #[error("conflict: {0}")]
    Conflict(String),

    /// A reply targeted a thread that does not exist
    #[error("thread {0} not found")]
    ThreadNotFound(PostId),

    /// Resource not found (e.g., post id, id + delete code pair)
    #[error("{0} not found")]
    NotFound(String),

    /// Infrastructure failure (e.g., DB down)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A specialized Result type for engine logic.
pub type Result<T> = std::result::Result<T, DomainError>;
