//! OpenAI provider implementation
//!
//! This module implements the LLMProvider trait for OpenAI's chat completions
//! API. See: https://platform.openai.com/docs/api-reference/chat
//!
//! Groq, DeepSeek and Gemini expose the same wire format, so they are served
//! by this provider with a different `api_base` and `provider_name`.
//!
//! # Examples
//!
//! ```no_run
//! use agent_llm::{CompletionRequest, Message, LLMProvider};
//! use agent_llm::providers::{OpenAIProvider, OpenAIConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OpenAIConfig::new("gsk-...")
//!         .with_api_base("https://api.groq.com/openai/v1")
//!         .with_provider_name("groq");
//!     let provider = OpenAIProvider::with_config(config)?;
//!
//!     let request = CompletionRequest::builder("llama-3.3-70b-versatile")
//!         .add_message(Message::user("Hello!"))
//!         .max_tokens(100)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.message.text().unwrap_or_default());
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider, Message,
    MessageContent, ResponseFormat, Result, Role, StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

pub(crate) const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Endpoint, credentials and reported name of an OpenAI-compatible backend
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    /// Base URL without the `/chat/completions` suffix
    pub api_base: String,
    pub timeout: Duration,
    /// Name reported by [`LLMProvider::name`], used in logs and errors
    pub provider_name: String,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout: Duration::from_secs(120),
            provider_name: "openai".to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }
}

/// Chat completions client for OpenAI and compatible backends
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %request.model, provider = %self.config.provider_name))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to {}", self.config.api_base);

        let model = request.model.clone();
        let openai_request = build_request(request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await?;

        let response = super::check_status(response, &model).await?;
        let openai_response: OpenAIResponse = super::decode(response).await?;

        let choice = openai_response.choices.into_iter().next().ok_or_else(|| {
            LLMError::UnexpectedResponse("No choices in response".to_string())
        })?;

        let usage = openai_response.usage.unwrap_or_default();
        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("none"),
            "Chat completion response"
        );

        Ok(CompletionResponse {
            message: parse_openai_response(choice.message),
            stop_reason: map_stop_reason(choice.finish_reason.as_deref()),
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &str {
        &self.config.provider_name
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    /// Token budget for reasoning models, which reject `max_tokens`
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

impl OpenAIMessage {
    fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

// ============================================================================
// Conversion functions
// ============================================================================

fn build_request(request: CompletionRequest) -> OpenAIRequest {
    let mut messages = Vec::new();

    if let Some(system) = request.system {
        messages.push(OpenAIMessage::new("system", system));
    }

    // JSON mode only constrains syntax; the schema travels as an instruction
    let response_format = request.response_format.map(|format| match format {
        ResponseFormat::Json { schema, .. } => {
            messages.push(OpenAIMessage::new(
                "system",
                format!("Respond only with a JSON object matching this JSON schema:\n{schema}"),
            ));
            json!({"type": "json_object"})
        }
    });

    messages.extend(request.messages.iter().map(convert_message));

    let reasoning = is_reasoning_model(&request.model);
    OpenAIRequest {
        messages,
        max_tokens: (!reasoning).then_some(request.max_tokens),
        max_completion_tokens: reasoning.then_some(request.max_tokens),
        temperature: request.temperature.filter(|_| !reasoning),
        response_format,
        model: request.model,
    }
}

/// o-series models (`o1`, `o3-mini`, ...) take `max_completion_tokens` and a
/// fixed temperature
fn is_reasoning_model(model: &str) -> bool {
    let mut chars = model.chars();
    chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Flatten a message to text; structured blocks are sent as their JSON
fn convert_message(msg: &Message) -> OpenAIMessage {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    };

    let content = match &msg.content {
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Blocks(blocks)) => blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.clone(),
                ContentBlock::ToolUse { input, .. } => input.to_string(),
                ContentBlock::Other => String::new(),
            })
            .collect(),
        None => String::new(),
    };

    OpenAIMessage::new(role, content)
}

fn parse_openai_response(msg: OpenAIResponseMessage) -> Message {
    let blocks = msg
        .content
        .filter(|content| !content.is_empty())
        .map(|text| vec![ContentBlock::Text { text }])
        .unwrap_or_default();

    Message {
        role: Role::Assistant,
        content: Some(MessageContent::Blocks(blocks)),
    }
}

fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        Some("stop") | None => StopReason::EndTurn,
        Some(other) => {
            debug!("Unmapped stop reason: {}", other);
            StopReason::EndTurn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.config().api_key, "test-key");
        assert_eq!(provider.config().api_base, "https://api.openai.com/v1");
    }

    #[test]
    fn test_compatible_provider_config() {
        let config = OpenAIConfig::new("gsk-test")
            .with_api_base("https://api.groq.com/openai/v1/")
            .with_provider_name("groq")
            .with_timeout(Duration::from_secs(30));
        let provider = OpenAIProvider::with_config(config).unwrap();
        assert_eq!(provider.name(), "groq");
        assert_eq!(provider.config().api_base, "https://api.groq.com/openai/v1");
        assert_eq!(provider.config().timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_json_mode_request() {
        let request = CompletionRequest::builder("gpt-4o")
            .system("You are Warren Buffett.")
            .add_message(Message::user("Analyze AAPL"))
            .response_format(ResponseFormat::Json {
                name: "signal".to_string(),
                description: "Signal".to_string(),
                schema: json!({"type": "object", "required": ["signal"]}),
            })
            .build();

        let wire = serde_json::to_value(build_request(request)).unwrap();
        assert_eq!(wire["response_format"], json!({"type": "json_object"}));
        assert_eq!(wire["messages"][0]["role"], "system");
        assert_eq!(wire["messages"][0]["content"], "You are Warren Buffett.");
        assert!(
            wire["messages"][1]["content"]
                .as_str()
                .unwrap()
                .contains("\"required\":[\"signal\"]")
        );
        assert_eq!(wire["messages"][2]["role"], "user");
        assert_eq!(wire["messages"][2]["content"], "Analyze AAPL");
    }

    #[test]
    fn test_reasoning_model_token_budget() {
        let request = CompletionRequest::builder("o1")
            .add_message(Message::user("Analyze AAPL"))
            .max_tokens(2048)
            .temperature(0.0)
            .build();

        let wire = serde_json::to_value(build_request(request)).unwrap();
        assert_eq!(wire["max_completion_tokens"], 2048);
        assert!(wire.get("max_tokens").is_none());
        assert!(wire.get("temperature").is_none());

        let request = CompletionRequest::builder("gpt-4o")
            .max_tokens(2048)
            .temperature(0.0)
            .build();
        let wire = serde_json::to_value(build_request(request)).unwrap();
        assert_eq!(wire["max_tokens"], 2048);
        assert_eq!(wire["temperature"], 0.0);
        assert!(wire.get("max_completion_tokens").is_none());
    }

    #[test]
    fn test_reasoning_model_detection() {
        assert!(is_reasoning_model("o1"));
        assert!(is_reasoning_model("o3-mini"));
        assert!(!is_reasoning_model("gpt-4o"));
        assert!(!is_reasoning_model("openai-custom"));
    }

    #[test]
    fn test_markdown_mode_request_is_plain() {
        let request = CompletionRequest::builder("deepseek-chat")
            .add_message(Message::user("Analyze NVDA"))
            .build();

        let wire = serde_json::to_value(build_request(request)).unwrap();
        assert!(wire.get("response_format").is_none());
        assert_eq!(wire["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_response_text() {
        let msg: OpenAIResponseMessage =
            serde_json::from_value(json!({"role": "assistant", "content": "{\"a\":1}"})).unwrap();
        let message = parse_openai_response(msg);
        assert_eq!(message.text().as_deref(), Some("{\"a\":1}"));

        let empty: OpenAIResponseMessage =
            serde_json::from_value(json!({"role": "assistant", "content": null})).unwrap();
        assert!(parse_openai_response(empty).text().is_none());
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason(Some("stop")), StopReason::EndTurn);
        assert_eq!(map_stop_reason(Some("length")), StopReason::MaxTokens);
        assert_eq!(map_stop_reason(Some("content_filter")), StopReason::EndTurn);
        assert_eq!(map_stop_reason(None), StopReason::EndTurn);
    }
}
