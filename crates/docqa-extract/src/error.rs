//! Error types for document extraction and chunking.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid chunking config: {0}")]
    InvalidConfig(String),
}

impl ExtractError {
    pub(crate) fn parse(path: &std::path::Path, message: impl ToString) -> Self {
        ExtractError::Parse {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}
