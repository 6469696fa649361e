//! Store error type.

/// Errors raised by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
