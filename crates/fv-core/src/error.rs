//! # AppError
//!
//! Centralized error handling for the Fleet Vitals engine.
//! Every mutation path ends in success or exactly one of these variants.

use thiserror::Error;

/// The primary error type for all fv-core and fv-engine operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid input (blank name, non-positive frequency, malformed date).
    /// Raised before any store call is made.
    #[error("validation error: {0}")]
    Validation(String),

    /// A foreign key does not resolve (e.g., Deadline pointing at an unknown Machine)
    #[error("unresolved {0} reference: {1}")]
    Reference(&'static str, String),

    /// Update/delete target is absent
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// The external store failed or was unreachable. Not retried.
    #[error("store error: {0}")]
    Store(String),

    /// The operation would break a referential invariant
    #[error("conflict: {0}")]
    Conflict(String),
}

impl AppError {
    /// Wraps a failure coming back from a `FleetStore` port.
    pub fn store(err: anyhow::Error) -> Self {
        AppError::Store(format!("{err:#}"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

/// A specialized Result type for Fleet Vitals logic.
pub type Result<T> = std::result::Result<T, AppError>;
