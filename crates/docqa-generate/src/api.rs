//! HTTP chat providers: OpenAI, Anthropic, Ollama and Groq.
//!
//! Ollama and Groq speak the OpenAI chat completions protocol, so three of
//! the four providers share one request path.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use docqa_types::ModelProfile;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::GeneratorError;
use crate::generator::{GenerationRequest, Generator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiProvider {
    OpenAi,
    Anthropic,
    Ollama,
    Groq,
}

impl ApiProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "https://api.openai.com/v1",
            ApiProvider::Anthropic => "https://api.anthropic.com/v1",
            ApiProvider::Ollama => "http://localhost:11434",
            ApiProvider::Groq => "https://api.groq.com/openai/v1",
        }
    }

    /// Environment variable consulted when a profile has no key.
    pub fn key_env_var(&self) -> Option<&'static str> {
        match self {
            ApiProvider::OpenAi => Some("OPENAI_API_KEY"),
            ApiProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            ApiProvider::Groq => Some("GROQ_API_KEY"),
            ApiProvider::Ollama => None,
        }
    }

    fn chat_path(&self) -> &'static str {
        match self {
            ApiProvider::Anthropic => "/messages",
            ApiProvider::Ollama => "/v1/chat/completions",
            ApiProvider::OpenAi | ApiProvider::Groq => "/chat/completions",
        }
    }
}

impl FromStr for ApiProvider {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ApiProvider::OpenAi),
            "anthropic" | "claude" => Ok(ApiProvider::Anthropic),
            "ollama" => Ok(ApiProvider::Ollama),
            "groq" => Ok(ApiProvider::Groq),
            other => Err(GeneratorError::ConfigError(format!(
                "unknown model provider: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiGeneratorConfig {
    /// Profile name the generator answers under
    pub name: String,
    pub provider: ApiProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ApiGeneratorConfig {
    pub fn new(name: impl Into<String>, provider: ApiProvider, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider,
            base_url: provider.default_base_url().to_string(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(model.clone(), ApiProvider::OpenAi, model)
            .with_api_key(api_key)
    }

    pub fn claude(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(model.clone(), ApiProvider::Anthropic, model)
            .with_api_key(api_key)
    }

    pub fn ollama(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(model.clone(), ApiProvider::Ollama, model)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Build from a configured profile. A missing key falls back to the
    /// provider's environment variable; if that is unset too, requests fail
    /// with `ConfigError` but construction still succeeds.
    pub fn from_profile(name: &str, profile: &ModelProfile) -> Result<Self, GeneratorError> {
        let provider: ApiProvider = profile.provider.parse()?;
        let mut config = Self::new(name, provider, profile.model.clone());
        if let Some(base_url) = &profile.base_url {
            config = config.with_base_url(base_url.clone());
        }
        let key = profile.api_key.clone().or_else(|| {
            provider
                .key_env_var()
                .and_then(|var| std::env::var(var).ok())
        });
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            config = config.with_api_key(key);
        }
        config.timeout = Duration::from_secs(profile.timeout_secs);
        config.max_retries = profile.max_retries;
        config.temperature = profile.temperature;
        config.max_tokens = profile.max_tokens;
        Ok(config)
    }

    pub fn chat_url(&self) -> String {
        format!("{}{}", self.base_url, self.provider.chat_path())
    }
}

/// A request failure, split by whether retrying can help.
enum Attempt {
    Retry(GeneratorError),
    Fatal(GeneratorError),
}

pub struct ApiGenerator {
    client: Client,
    config: ApiGeneratorConfig,
}

impl ApiGenerator {
    pub fn new(config: ApiGeneratorConfig) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeneratorError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiGeneratorConfig {
        &self.config
    }

    /// Call the API with retry logic.
    async fn call_api(&self, prompt: &str) -> Result<String, GeneratorError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, model = %self.config.model, "Calling chat API");

            let err = match self.make_request(prompt).await {
                Ok(text) => return Ok(text),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => e,
            };

            if attempts >= self.config.max_retries.max(1) {
                error!(error = %err, "Max retries exceeded");
                return Err(err);
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    warn!(
                        error = %err,
                        retry_in_ms = duration.as_millis(),
                        "API call failed, retrying"
                    );
                    tokio::time::sleep(duration).await;
                }
                None => {
                    error!(error = %err, "Backoff exhausted");
                    return Err(err);
                }
            }
        }
    }

    async fn make_request(&self, prompt: &str) -> Result<String, Attempt> {
        let needs_key = self.config.provider.key_env_var().is_some();
        if needs_key && self.config.api_key.is_none() {
            return Err(Attempt::Fatal(GeneratorError::ConfigError(format!(
                "model {} has no API key",
                self.config.name
            ))));
        }

        let response = match self.config.provider {
            ApiProvider::Anthropic => self.send_anthropic(prompt).await?,
            _ => self.send_openai(prompt).await?,
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt::Retry(GeneratorError::RateLimitExceeded));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = GeneratorError::ApiError(format!("HTTP {status}: {body}"));
            return Err(if status.is_server_error() {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Retry(GeneratorError::ApiError(e.to_string())))?;
        match self.config.provider {
            ApiProvider::Anthropic => parse_anthropic(&body),
            _ => parse_openai(&body),
        }
        .map_err(Attempt::Fatal)
    }

    async fn send_openai(&self, prompt: &str) -> Result<reqwest::Response, Attempt> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self.client.post(self.config.chat_url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        builder
            .send()
            .await
            .map_err(|e| Attempt::Retry(GeneratorError::ApiError(e.to_string())))
    }

    async fn send_anthropic(&self, prompt: &str) -> Result<reqwest::Response, Attempt> {
        #[derive(Serialize)]
        struct MessagesRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            messages: Vec<Message<'a>>,
        }

        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }

        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let key = self
            .config
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default();
        self.client
            .post(self.config.chat_url())
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| Attempt::Retry(GeneratorError::ApiError(e.to_string())))
    }
}

fn parse_openai(body: &str) -> Result<String, GeneratorError> {
    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChoiceMessage {
        content: String,
    }

    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| GeneratorError::ParseError(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .ok_or_else(|| GeneratorError::ParseError("No choices in response".to_string()))
}

fn parse_anthropic(body: &str) -> Result<String, GeneratorError> {
    #[derive(Deserialize)]
    struct MessagesResponse {
        content: Vec<Content>,
    }

    #[derive(Deserialize)]
    struct Content {
        #[serde(default)]
        text: String,
    }

    let response: MessagesResponse =
        serde_json::from_str(body).map_err(|e| GeneratorError::ParseError(e.to_string()))?;
    let text: String = response
        .content
        .into_iter()
        .map(|c| c.text)
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return Err(GeneratorError::ParseError(
            "No content in response".to_string(),
        ));
    }
    Ok(text.trim().to_string())
}

#[async_trait]
impl Generator for ApiGenerator {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        self.call_api(&request.prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn openai_reply(text: &str) -> serde_json::Value {
        json!({ "choices": [ { "message": { "role": "assistant", "content": text } } ] })
    }

    #[tokio::test]
    async fn test_openai_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "messages": [ { "role": "user", "content": "Hello?" } ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(" Hi there. ")))
            .expect(1)
            .mount(&server)
            .await;

        let config = ApiGeneratorConfig::openai("sk-test", "gpt-3.5-turbo").with_base_url(server.uri());
        let generator = ApiGenerator::new(config).unwrap();
        let answer = generator
            .generate(&GenerationRequest::new("Hello?"))
            .await
            .unwrap();
        assert_eq!(answer, "Hi there.");
        assert_eq!(generator.name(), "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_ollama_uses_openai_compatible_path_without_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("local answer")))
            .expect(1)
            .mount(&server)
            .await;

        let config = ApiGeneratorConfig::ollama("llama3.1").with_base_url(server.uri());
        let generator = ApiGenerator::new(config).unwrap();
        let answer = generator.generate(&GenerationRequest::new("q")).await.unwrap();
        assert_eq!(answer, "local answer");
    }

    #[tokio::test]
    async fn test_anthropic_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "ak-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [ { "type": "text", "text": "Claude says hi" } ]
            })))
            .mount(&server)
            .await;

        let config = ApiGeneratorConfig::claude("ak-test", "claude-3-haiku-20240307")
            .with_base_url(server.uri());
        let generator = ApiGenerator::new(config).unwrap();
        let answer = generator.generate(&GenerationRequest::new("q")).await.unwrap();
        assert_eq!(answer, "Claude says hi");
    }

    #[tokio::test]
    async fn test_rate_limit_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let config = ApiGeneratorConfig::openai("k", "gpt-4o-mini")
            .with_base_url(server.uri())
            .with_max_retries(2);
        let generator = ApiGenerator::new(config).unwrap();
        let result = generator.generate(&GenerationRequest::new("q")).await;
        assert!(matches!(result, Err(GeneratorError::RateLimitExceeded)));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .expect(1)
            .mount(&server)
            .await;

        let config = ApiGeneratorConfig::openai("k", "nope").with_base_url(server.uri());
        let generator = ApiGenerator::new(config).unwrap();
        match generator.generate(&GenerationRequest::new("q")).await {
            Err(GeneratorError::ApiError(msg)) => {
                assert!(msg.contains("400"));
                assert!(msg.contains("bad model"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config =
            ApiGeneratorConfig::new("gpt", ApiProvider::OpenAi, "gpt-4o").with_base_url(server.uri());
        let generator = ApiGenerator::new(config).unwrap();
        let result = generator.generate(&GenerationRequest::new("q")).await;
        assert!(matches!(result, Err(GeneratorError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_default_suggest_parses_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(
                "1. What about sale items?\n2. Who pays return postage?\n3. Can I exchange instead?",
            )))
            .mount(&server)
            .await;

        let config = ApiGeneratorConfig::ollama("llama3.1").with_base_url(server.uri());
        let generator = ApiGenerator::new(config).unwrap();
        let suggestions = generator
            .suggest("What is the refund window?", "14 days.")
            .await
            .unwrap();
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0], "What about sale items?");
    }

    #[test]
    fn test_from_profile() {
        let mut profile = ModelProfile::new("groq", "llama-3.1-8b-instant");
        profile.api_key = Some("gk".into());
        profile.base_url = Some("http://proxy.local/v1/".into());
        profile.max_retries = 5;

        let config = ApiGeneratorConfig::from_profile("fast", &profile).unwrap();
        assert_eq!(config.name, "fast");
        assert_eq!(config.provider, ApiProvider::Groq);
        assert_eq!(config.chat_url(), "http://proxy.local/v1/chat/completions");
        assert_eq!(config.max_retries, 5);
        assert!(config.api_key.is_some());
    }

    #[test]
    fn test_unknown_provider() {
        let profile = ModelProfile::new("watson", "x");
        assert!(matches!(
            ApiGeneratorConfig::from_profile("x", &profile),
            Err(GeneratorError::ConfigError(_))
        ));
    }

    #[test]
    fn test_default_urls() {
        assert_eq!(
            ApiGeneratorConfig::ollama("m").chat_url(),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            ApiGeneratorConfig::claude("k", "m").chat_url(),
            "https://api.anthropic.com/v1/messages"
        );
    }
}
