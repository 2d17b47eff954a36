//! Service errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docqa_embeddings::EmbeddingError;
use docqa_extract::ExtractError;
use docqa_generate::GeneratorError;
use docqa_indexing::IndexingError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Generation error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Indexing error: {0}")]
    Indexing(#[from] IndexingError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServiceError::Internal(e.to_string())
    }
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) | ServiceError::UnsupportedType(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Generator(GeneratorError::UnknownModel(_)) => StatusCode::BAD_REQUEST,
            ServiceError::Generator(GeneratorError::RateLimitExceeded) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ServiceError::Extract(ExtractError::UnsupportedType(_) | ExtractError::Parse { .. }) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });

        (status, Json(body)).into_response()
    }
}
