//! Application error types.

use thiserror::Error;

/// Application-level errors for graphtx.
#[derive(Error, Debug)]
pub enum AppError {
    // Store errors
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Query error: {message}")]
    Query { message: String, query: String },

    // Execution errors
    #[error("Input sequence exhausted")]
    EndOfSequence,

    #[error("Unit of work failed: {0}")]
    UnitOfWork(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Failures of the store itself. These are never swallowed by a batch.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, AppError::Connection(_))
    }

    /// Failures worth retrying in a fresh transaction (deadlocks, serialization conflicts).
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }
}
