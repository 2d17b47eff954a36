//! Error types shared across docqa crates.

use thiserror::Error;

/// Error type for configuration and domain-level validation.
#[derive(Debug, Error)]
pub enum DocqaError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
