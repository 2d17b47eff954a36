//! Client library for a running docqa server.
//!
//! # Example
//!
//! ```rust,no_run
//! use docqa_client::{DocqaClient, QueryRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DocqaClient::new("http://127.0.0.1:8000")?;
//!     let answer = client.ask(QueryRequest::new("What is the refund policy?")).await?;
//!     println!("{}", answer.answer);
//!     for r in &answer.references {
//!         println!("  {} p.{}", r.file_name, r.page_number);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;

pub use client::{DocqaClient, DocumentList, UploadResult, DEFAULT_ENDPOINT};
pub use error::ClientError;

pub use docqa_service::{QueryRequest, ServiceStatus, SyncReport};
pub use docqa_types::{Answer, DocumentSummary};
