//! Error types shared by the Dex workspace

use thiserror::Error;

/// Result type alias for Dex operations
pub type Result<T> = std::result::Result<T, DexError>;

/// Main error type for Dex
#[derive(Error, Debug)]
pub enum DexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl DexError {
    /// Create a configuration error for an environment variable that failed to parse
    pub fn invalid_env(name: &str, value: &str, reason: impl std::fmt::Display) -> Self {
        Self::Config(format!("{}={:?} is invalid: {}", name, value, reason))
    }
}
