//! Structured output coercion
//!
//! Backends fall into two groups. Most can be told to answer with a JSON
//! object directly ([`ResponseMode::Structured`]). Others answer in free text
//! and embed the JSON in a fenced ```` ```json ```` block
//! ([`ResponseMode::MarkdownJson`]), which has to be cut out and parsed.

use crate::completion::{CompletionRequestBuilder, CompletionResponse, ResponseFormat};
use crate::schema::StructuredOutput;
use crate::{LLMError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// How a backend's answer is coerced into the target type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Backend is asked for a JSON object matching the schema
    Structured,
    /// Backend answers in free text with a fenced JSON block
    MarkdownJson,
}

impl ResponseMode {
    /// Attach whatever the mode needs to the outgoing request
    pub fn prepare<T: StructuredOutput>(
        self,
        builder: CompletionRequestBuilder,
    ) -> CompletionRequestBuilder {
        match self {
            Self::Structured => {
                let schema = T::schema();
                builder.response_format(ResponseFormat::Json {
                    name: schema.name.to_string(),
                    description: schema.description.to_string(),
                    schema: schema.json_schema(),
                })
            }
            Self::MarkdownJson => builder,
        }
    }

    /// Pull a `T` out of a backend response
    pub fn extract<T: StructuredOutput>(self, response: &CompletionResponse) -> Result<T> {
        let value = match self {
            Self::Structured => structured_payload(response)?,
            Self::MarkdownJson => {
                let text = response.message.text().ok_or_else(|| {
                    LLMError::ExtractionFailed("response has no text content".to_string())
                })?;
                extract_json_block(&text).ok_or_else(|| {
                    LLMError::ExtractionFailed("no parseable ```json block in response".to_string())
                })?
            }
        };
        T::from_json(value)
    }
}

fn structured_payload(response: &CompletionResponse) -> Result<Value> {
    if let Some(input) = response.message.tool_input() {
        return Ok(input.clone());
    }

    let text = response.message.text().ok_or_else(|| {
        LLMError::ExtractionFailed("response has neither tool input nor text".to_string())
    })?;

    match serde_json::from_str(text.trim()) {
        Ok(value) => Ok(value),
        // Some JSON-mode backends still wrap the object in a fence
        Err(e) => extract_json_block(&text)
            .ok_or_else(|| LLMError::ExtractionFailed(format!("response is not JSON: {e}"))),
    }
}

/// Parse the first ```` ```json ```` fenced block in `text`
///
/// The block runs from just after the opening marker to the first closing
/// fence after it. Returns `None` when there is no opening marker, no closing
/// fence, or the enclosed text is not valid JSON.
pub fn extract_json_block(text: &str) -> Option<Value> {
    let start = text.find(FENCE_OPEN)? + FENCE_OPEN.len();
    let rest = &text[start..];
    let end = rest.find(FENCE_CLOSE)?;
    serde_json::from_str(rest[..end].trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionRequest, StopReason, TokenUsage};
    use crate::messages::{ContentBlock, Message, MessageContent, Role};
    use crate::schema::{FieldKind, FieldSpec, Schema};
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        signal: String,
        confidence: f64,
    }

    impl StructuredOutput for Verdict {
        fn schema() -> Schema {
            Schema::new(
                "verdict",
                "A verdict",
                vec![
                    FieldSpec::new("signal", "Direction", FieldKind::String),
                    FieldSpec::new("confidence", "Confidence", FieldKind::Float),
                ],
            )
        }
    }

    fn response(message: Message) -> CompletionResponse {
        CompletionResponse {
            message,
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    #[test]
    fn test_extract_json_block() {
        let text = "preamble ```json\n{\"signal\": \"bullish\", \"confidence\": 80}\n```\ntrailing";
        assert_eq!(
            extract_json_block(text),
            Some(json!({"signal": "bullish", "confidence": 80}))
        );
    }

    #[test]
    fn test_extract_json_block_uses_first_closing_fence() {
        let text = "```json\n{\"a\": 1}\n```\nthen ```json\n{\"a\": 2}\n```";
        assert_eq!(extract_json_block(text), Some(json!({"a": 1})));
    }

    #[test]
    fn test_extract_json_block_failures() {
        assert_eq!(extract_json_block("{\"a\": 1}"), None);
        assert_eq!(extract_json_block("```json\n{\"a\": 1}"), None);
        assert_eq!(extract_json_block("```json\nnot json\n```"), None);
    }

    #[test]
    fn test_markdown_mode_extract() {
        let resp = response(Message::assistant(
            "Here you go:\n```json\n{\"signal\": \"neutral\", \"confidence\": 12.5}\n```",
        ));
        let verdict: Verdict = ResponseMode::MarkdownJson.extract(&resp).unwrap();
        assert_eq!(verdict.signal, "neutral");
        assert_eq!(verdict.confidence, 12.5);

        let resp = response(Message::assistant("I think it is bullish."));
        let err = ResponseMode::MarkdownJson.extract::<Verdict>(&resp).unwrap_err();
        assert!(matches!(err, LLMError::ExtractionFailed(_)));
    }

    #[test]
    fn test_structured_mode_prefers_tool_input() {
        let resp = response(Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(vec![
                ContentBlock::Text {
                    text: "ignored".to_string(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "verdict".to_string(),
                    input: json!({"signal": "bearish", "confidence": 70.0}),
                },
            ])),
        });
        let verdict: Verdict = ResponseMode::Structured.extract(&resp).unwrap();
        assert_eq!(verdict.signal, "bearish");
    }

    #[test]
    fn test_structured_mode_parses_text() {
        let resp = response(Message::assistant(
            " {\"signal\": \"bullish\", \"confidence\": 90.0} ",
        ));
        let verdict: Verdict = ResponseMode::Structured.extract(&resp).unwrap();
        assert_eq!(verdict.confidence, 90.0);

        let resp = response(Message::assistant("{\"signal\": \"bullish\"}"));
        assert!(ResponseMode::Structured.extract::<Verdict>(&resp).is_err());
    }

    #[test]
    fn test_prepare_sets_response_format() {
        let request = ResponseMode::Structured
            .prepare::<Verdict>(CompletionRequest::builder("gpt-4o"))
            .build();
        match request.response_format {
            Some(ResponseFormat::Json { name, schema, .. }) => {
                assert_eq!(name, "verdict");
                assert_eq!(schema["required"], json!(["signal", "confidence"]));
            }
            None => panic!("expected a response format"),
        }

        let request = ResponseMode::MarkdownJson
            .prepare::<Verdict>(CompletionRequest::builder("deepseek-chat"))
            .build();
        assert!(request.response_format.is_none());
    }
}
