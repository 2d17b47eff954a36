//! Generation error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid prompt template: {0}")]
    Template(String),

    /// No model profile with this name
    #[error("Unknown model: {0}")]
    UnknownModel(String),
}
