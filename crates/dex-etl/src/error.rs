//! ETL error types

use thiserror::Error;

/// Result type alias for run-level operations
pub type EtlResult<T> = std::result::Result<T, EtlError>;

/// Failures that stop a run or prevent it from starting
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Schema provisioning failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a single pokemon could not be loaded
///
/// Both variants are per-entity; the batch continues after either.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The transformed input cannot be loaded; the store was not touched.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store rejected a statement (constraint violation, lost connection, ...).
    /// The entity's transaction has been rolled back.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl LoadError {
    pub fn is_store_error(&self) -> bool {
        matches!(self, LoadError::Store(_))
    }
}
