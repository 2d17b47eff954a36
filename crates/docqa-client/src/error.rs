//! Error types for the docqa client.

use thiserror::Error;

/// Errors that can occur when talking to a docqa server.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request could not be sent or the response not read
    #[error("Connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    /// Server answered with an error status
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
