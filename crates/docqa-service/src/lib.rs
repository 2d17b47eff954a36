//! # docqa-service
//!
//! The question-answering service and its HTTP API.
//!
//! [`DocumentQaService`] ties the document index to the generators:
//! retrieve the top chunks for a question (vector, keyword or hybrid with
//! reciprocal rank fusion), render the prompt with conversation history,
//! ask the model, and return the answer with its references. [`router`]
//! exposes it over axum.

pub mod error;
pub mod fusion;
pub mod pipeline;
pub mod server;
pub mod service;

pub use error::ServiceError;
pub use fusion::{fuse_rrf, RRF_K};
pub use pipeline::{validate_file_name, DocumentPipeline, IngestReport, SyncReport};
pub use server::{router, run_server_with_shutdown, shutdown_signal, AppState};
pub use service::{DocumentQaService, QueryRequest, ServiceStatus};
