//! Anthropic Claude provider implementation
//!
//! This module implements the LLMProvider trait for Anthropic's Claude models.
//! See: https://docs.anthropic.com/en/api/messages
//!
//! The Messages API has no JSON mode. A requested [`ResponseFormat`] is turned
//! into a single tool whose input schema is the target schema, and the model
//! is forced to call it; the answer arrives as the tool-use input.

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMProvider, Message,
    MessageContent, ResponseFormat, Result, Role, StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    api_base: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key,
            api_base: ANTHROPIC_API_BASE.to_string(),
        })
    }

    /// Point the provider at a different endpoint (proxies, test servers)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to Anthropic API");

        let model = request.model.clone();
        let anthropic_request = build_request(request);

        let response = self
            .client
            .post(format!("{}/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&anthropic_request)
            .send()
            .await?;

        let response = super::check_status(response, &model).await?;
        let body: AnthropicResponse = super::decode(response).await?;

        debug!(stop_reason = %body.stop_reason, blocks = body.content.len(), "Anthropic response");

        Ok(CompletionResponse {
            message: Message {
                role: Role::Assistant,
                content: Some(MessageContent::Blocks(body.content)),
            },
            stop_reason: map_stop_reason(&body.stop_reason),
            usage: TokenUsage {
                input_tokens: body.usage.input_tokens,
                output_tokens: body.usage.output_tokens,
            },
        })
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        "tool_use" => StopReason::ToolUse,
        _ => StopReason::EndTurn,
    }
}

fn build_request(request: CompletionRequest) -> AnthropicRequest {
    let (tools, tool_choice) = match request.response_format {
        Some(ResponseFormat::Json {
            name,
            description,
            schema,
        }) => (
            vec![ForcedTool {
                name: name.clone(),
                description,
                input_schema: schema,
            }],
            Some(ToolChoice {
                kind: "tool",
                name,
            }),
        ),
        None => (Vec::new(), None),
    };

    // System text travels in its own field, system turns are appended to it
    let (system_turns, messages): (Vec<Message>, Vec<Message>) = request
        .messages
        .into_iter()
        .partition(|m| m.role == Role::System);
    let system_parts: Vec<String> = request
        .system
        .into_iter()
        .chain(system_turns.iter().filter_map(Message::text))
        .filter(|text| !text.is_empty())
        .collect();

    AnthropicRequest {
        model: request.model,
        messages,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        tools,
        tool_choice,
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ForcedTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

/// Tool whose input schema is the requested output schema
#[derive(Debug, Serialize)]
struct ForcedTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    kind: &'static str,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: String,
    usage: UsageResponse,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_creation() {
        let provider = AnthropicProvider::new("test-key".to_string()).unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.api_base, ANTHROPIC_API_BASE);
    }

    #[test]
    fn test_response_format_forces_tool() {
        let request = CompletionRequest::builder("claude-3-7-sonnet-latest")
            .system("You are Warren Buffett.")
            .add_message(Message::user("Analyze AAPL"))
            .response_format(ResponseFormat::Json {
                name: "warren_buffett_signal".to_string(),
                description: "Investment signal".to_string(),
                schema: json!({"type": "object"}),
            })
            .build();

        let wire = serde_json::to_value(build_request(request)).unwrap();
        assert_eq!(wire["system"], "You are Warren Buffett.");
        assert_eq!(wire["tools"][0]["name"], "warren_buffett_signal");
        assert_eq!(wire["tools"][0]["input_schema"], json!({"type": "object"}));
        assert_eq!(
            wire["tool_choice"],
            json!({"type": "tool", "name": "warren_buffett_signal"})
        );
    }

    #[test]
    fn test_plain_request_has_no_tools() {
        let request = CompletionRequest::builder("claude-3-5-haiku-latest")
            .add_message(Message::user("hi"))
            .build();
        let wire = serde_json::to_value(build_request(request)).unwrap();
        assert!(wire.get("tools").is_none());
        assert!(wire.get("tool_choice").is_none());
    }

    #[test]
    fn test_system_turns_fold_into_system() {
        let request = CompletionRequest::builder("claude-3-5-haiku-latest")
            .system("You are Warren Buffett.")
            .add_message(Message::user("Analyze AAPL"))
            .add_message(Message {
                role: Role::System,
                content: Some(MessageContent::Text("Answer in JSON.".to_string())),
            })
            .build();

        let wire = serde_json::to_value(build_request(request)).unwrap();
        assert_eq!(wire["system"], "You are Warren Buffett.\n\nAnswer in JSON.");
        assert_eq!(wire["messages"].as_array().unwrap().len(), 1);
        assert_eq!(wire["messages"][0]["role"], "user");

        let request = CompletionRequest::builder("claude-3-5-haiku-latest")
            .add_message(Message::user("hi"))
            .build();
        let wire = serde_json::to_value(build_request(request)).unwrap();
        assert!(wire.get("system").is_none());
    }

    #[test]
    fn test_response_blocks_parse() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "signal", "input": {"signal": "neutral"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();
        assert_eq!(response.content.len(), 1);
        assert!(matches!(response.content[0], ContentBlock::ToolUse { .. }));
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason("tool_use"), StopReason::ToolUse);
        assert_eq!(map_stop_reason("max_tokens"), StopReason::MaxTokens);
        assert_eq!(map_stop_reason("refusal"), StopReason::EndTurn);
    }
}
