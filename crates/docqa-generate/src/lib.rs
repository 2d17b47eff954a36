//! # docqa-generate
//!
//! Turns retrieved chunks and a question into an answer.
//!
//! - [`PromptTemplate`] renders `{context}`, `{history}` and `{question}`
//! - [`build_context`] numbers chunks and fits them to a token budget
//! - [`ConversationMemory`] keeps recent exchanges per conversation
//! - [`Generator`] is the model seam; [`ApiGenerator`] talks to OpenAI,
//!   Anthropic, Ollama or Groq and [`MockGenerator`] answers offline
//! - [`GeneratorRegistry`] maps model profile names to generators

pub mod api;
pub mod context;
pub mod error;
pub mod generator;
pub mod memory;
pub mod mock;
pub mod prompt;
pub mod registry;

pub use api::{ApiGenerator, ApiGeneratorConfig, ApiProvider};
pub use context::{build_context, TokenCounter};
pub use error::GeneratorError;
pub use generator::{GenerationRequest, Generator};
pub use memory::{ConversationMemory, Role, Turn};
pub use mock::MockGenerator;
pub use prompt::{parse_suggestions, suggestion_prompt, PromptTemplate, DEFAULT_TEMPLATE};
pub use registry::GeneratorRegistry;
