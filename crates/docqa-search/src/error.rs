//! Search error types.

use thiserror::Error;

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Tantivy index error
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// Query parse error
    #[error("Query parse error: {0}")]
    QueryParse(#[from] tantivy::query::QueryParserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The index on disk was built with different fields
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Writer mutex was poisoned
    #[error("Index is locked: {0}")]
    IndexLocked(String),
}
