//! Mock generator for testing.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::GeneratorError;
use crate::generator::{GenerationRequest, Generator};

/// Deterministic generator that answers from the first context line.
///
/// Records every request so tests can inspect the rendered prompts.
pub struct MockGenerator {
    name: String,
    rate_limited: bool,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate_limited: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every call fails with `RateLimitExceeded`.
    pub fn rate_limited() -> Self {
        Self {
            rate_limited: true,
            ..Self::new()
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if self.rate_limited {
            return Err(GeneratorError::RateLimitExceeded);
        }

        let first_line = request
            .context
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("no context");
        Ok(format!("Based on {first_line}: {}", request.question))
    }

    async fn suggest(&self, question: &str, _answer: &str) -> Result<Vec<String>, GeneratorError> {
        if self.rate_limited {
            return Err(GeneratorError::RateLimitExceeded);
        }
        Ok(vec![format!("Tell me more about: {question}")])
    }
}
