//! Generator trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;
use crate::prompt::{parse_suggestions, suggestion_prompt};

/// Input to one generation call.
///
/// `prompt` is the fully rendered text sent to the model. `question` and
/// `context` are kept alongside for generators that work from the parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub question: String,
    pub context: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_parts(mut self, question: impl Into<String>, context: impl Into<String>) -> Self {
        self.question = question.into();
        self.context = context.into();
        self
    }
}

/// A language model that turns prompts into answers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model profile name, as reported in answers.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError>;

    /// Up to three follow-up questions for an answered question.
    async fn suggest(&self, question: &str, answer: &str) -> Result<Vec<String>, GeneratorError> {
        let request = GenerationRequest::new(suggestion_prompt(question, answer));
        let text = self.generate(&request).await?;
        Ok(parse_suggestions(&text))
    }
}
