//! OpenAI chat completions provider
//!
//! Also usable against OpenAI-compatible servers (vLLM, llama.cpp, LM Studio)
//! by pointing `api_base` at them.
//!
//! ```no_run
//! use intel_llm::{CompletionRequest, LLMProvider, Message};
//! use intel_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # async fn run() -> intel_llm::Result<()> {
//! let provider = OpenAIProvider::with_config(OpenAIConfig::new("sk-..."))?;
//! let request = CompletionRequest::builder("gpt-4-1106-preview")
//!     .system("Return JSON with a `market` field")
//!     .add_message(Message::user("EV market in Spain in 2024"))
//!     .json_mode()
//!     .build();
//!
//! println!("{}", provider.complete(request).await?.text());
//! # Ok(())
//! # }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, StopReason,
    TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for OpenAI provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the OpenAI API (default: "https://api.openai.com/v1")
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,

    /// Models this endpoint accepts; `None` accepts any
    pub supported_models: Option<Vec<String>>,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read `OPENAI_API_KEY` (required) and `OPENAI_API_BASE` (optional)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LLMError::ConfigurationError("OPENAI_API_KEY is not set".to_string()))?;

        let config = Self::new(api_key);
        Ok(match std::env::var("OPENAI_API_BASE") {
            Ok(base) if !base.trim().is_empty() => config.with_api_base(base),
            _ => config,
        })
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Restrict requests to the given models
    pub fn with_supported_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_models = Some(models.into_iter().map(Into::into).collect());
        self
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            supported_models: None,
        }
    }
}

/// OpenAI provider
///
/// Works with api.openai.com and with OpenAI-compatible servers.
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new OpenAI provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn check_model(&self, model: &str) -> Result<()> {
        match &self.config.supported_models {
            Some(models) if !models.iter().any(|m| m == model) => Err(LLMError::InvalidRequest(
                format!("model '{model}' is not supported by {}", self.config.api_base),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %request.model, json = request.wants_json()))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to OpenAI API at {}", self.config.api_base);
        self.check_model(&request.model)?;

        let openai_request = build_request(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&openai_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 => LLMError::AuthenticationFailed,
                429 => LLMError::RateLimitExceeded(error_text),
                400 => LLMError::InvalidRequest(error_text),
                404 => LLMError::ModelNotFound(request.model),
                _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::UnexpectedResponse(format!("Failed to parse response: {e}")))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

        let usage = openai_response.usage.unwrap_or_default();
        let finish_reason = choice.finish_reason.unwrap_or_default();

        debug!(
            "Received response - finish_reason: {}, tokens: {}/{}",
            finish_reason, usage.prompt_tokens, usage.completion_tokens
        );

        Ok(CompletionResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            stop_reason: map_stop_reason(&finish_reason),
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Build the wire request; the system prompt goes first in `messages`
fn build_request(request: &CompletionRequest) -> OpenAIRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system {
        messages.push(OpenAIMessage {
            role: "system",
            content: system.clone(),
        });
    }

    messages.extend(request.messages.iter().map(|m| OpenAIMessage {
        role: m.role.as_str(),
        content: m.content.clone(),
    }));

    OpenAIRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        response_format: request.wants_json().then_some(OpenAIResponseFormat {
            format_type: "json_object",
        }),
        stop: request.stop_sequences.clone(),
    }
}

/// Map OpenAI finish reason to our format
fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "length" => StopReason::MaxTokens,
        "content_filter" => {
            debug!("Content filtered by OpenAI safety systems");
            StopReason::ContentFilter
        }
        _ => {
            debug!("Unknown stop reason: {}", reason);
            StopReason::EndTurn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: &str, finish_reason: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": finish_reason
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
        })
    }

    async fn provider_for(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::with_config(OpenAIConfig::new("test-key").with_api_base(server.uri()))
            .unwrap()
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.config().api_key, "test-key");
        assert_eq!(provider.config().api_base, "https://api.openai.com/v1");
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let config = OpenAIConfig::new("k").with_api_base("http://localhost:1234/v1/");
        assert_eq!(config.api_base, "http://localhost:1234/v1");
    }

    #[test]
    fn test_supported_models() {
        let config = OpenAIConfig::new("k").with_supported_models(["gpt-4o", "gpt-4-1106-preview"]);
        let provider = OpenAIProvider::with_config(config).unwrap();

        assert!(provider.check_model("gpt-4o").is_ok());
        assert!(matches!(
            provider.check_model("llama-3"),
            Err(LLMError::InvalidRequest(_))
        ));
        assert!(OpenAIProvider::new("k").unwrap().check_model("anything").is_ok());
    }

    #[tokio::test]
    async fn test_unsupported_model_is_rejected_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{}", "stop")))
            .expect(0)
            .mount(&server)
            .await;

        let config = OpenAIConfig::new("k")
            .with_api_base(server.uri())
            .with_supported_models(["gpt-4o"]);
        let provider = OpenAIProvider::with_config(config).unwrap();
        let request = CompletionRequest::builder("llama-3").add_message(Message::user("x")).build();

        assert!(provider.complete(request).await.is_err());
    }

    #[test]
    fn test_build_request_places_system_first_and_sets_json_format() {
        let request = CompletionRequest::builder("gpt-4-1106-preview")
            .system("Return JSON")
            .add_message(Message::user("EV market"))
            .temperature(0.3)
            .json_mode()
            .build();

        let wire = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(wire["messages"][0]["role"], "system");
        assert_eq!(wire["messages"][0]["content"], "Return JSON");
        assert_eq!(wire["messages"][1]["role"], "user");
        assert_eq!(wire["response_format"]["type"], "json_object");
        assert!(wire.get("top_p").is_none());
    }

    #[test]
    fn test_build_request_text_mode_omits_response_format() {
        let request = CompletionRequest::builder("m")
            .add_message(Message::user("write"))
            .top_p(0.95)
            .build();

        let wire = serde_json::to_value(build_request(&request)).unwrap();
        assert!(wire.get("response_format").is_none());
        assert!(wire.get("temperature").is_none());
        assert_eq!(wire["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason("stop"), StopReason::EndTurn);
        assert_eq!(map_stop_reason("length"), StopReason::MaxTokens);
        assert_eq!(map_stop_reason("content_filter"), StopReason::ContentFilter);
        assert_eq!(map_stop_reason("unknown"), StopReason::EndTurn);
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"response_format": {"type": "json_object"}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body(r#"{"market":"EV"}"#, "stop")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let request = CompletionRequest::builder("gpt-4-1106-preview")
            .add_message(Message::user("EV"))
            .json_mode()
            .build();

        let response = provider.complete(request).await.unwrap();
        assert_eq!(response.text(), r#"{"market":"EV"}"#);
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.total(), 19);
    }

    #[tokio::test]
    async fn test_complete_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let request = CompletionRequest::builder("m").add_message(Message::user("x")).build();

        assert!(matches!(
            provider.complete(request).await,
            Err(LLMError::AuthenticationFailed)
        ));
    }

    async fn complete_with_status(status: u16) -> Result<CompletionResponse> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream says no"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let request = CompletionRequest::builder("gpt-4-1106-preview")
            .add_message(Message::user("x"))
            .build();
        provider.complete(request).await
    }

    #[tokio::test]
    async fn test_complete_bad_request() {
        match complete_with_status(400).await {
            Err(LLMError::InvalidRequest(body)) => assert_eq!(body, "upstream says no"),
            other => panic!("expected invalid request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_unknown_model() {
        match complete_with_status(404).await {
            Err(LLMError::ModelNotFound(model)) => assert_eq!(model, "gpt-4-1106-preview"),
            other => panic!("expected model not found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_server_error() {
        match complete_with_status(503).await {
            Err(LLMError::RequestFailed(message)) => {
                assert!(message.contains("503"));
                assert!(message.contains("upstream says no"));
            }
            other => panic!("expected request failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let request = CompletionRequest::builder("m").add_message(Message::user("x")).build();

        match provider.complete(request).await {
            Err(LLMError::RateLimitExceeded(body)) => assert_eq!(body, "slow down"),
            other => panic!("expected rate limit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_without_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let request = CompletionRequest::builder("m").add_message(Message::user("x")).build();

        assert!(matches!(
            provider.complete(request).await,
            Err(LLMError::UnexpectedResponse(_))
        ));
    }
}
