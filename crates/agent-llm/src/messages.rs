//! Prompt turns and model answers
//!
//! A message is a role plus either plain text or a list of content blocks.
//! Blocks are what providers hand back: text, and tool-use payloads when a
//! provider was forced to answer through a tool (see
//! [`ResponseFormat`](crate::ResponseFormat)).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Sent in a dedicated field by backends that have one
    System,
}

/// Piece of a model answer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },

    /// Forced tool call carrying a structured answer
    ToolUse {
        /// Provider-assigned call id
        id: String,
        name: String,
        /// Arguments the model filled in
        input: Value,
    },

    /// Any block type this crate does not interpret (e.g. reasoning traces)
    #[serde(other)]
    Other,
}

/// Plain text or a list of blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One turn of a prompt or a model answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
}

impl Message {
    fn with_text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(text.into())),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_text(Role::Assistant, text)
    }

    fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            Some(MessageContent::Blocks(blocks)) => blocks,
            _ => &[],
        }
    }

    /// Text of the message, with text blocks joined in order
    ///
    /// `None` when the message carries no text at all.
    pub fn text(&self) -> Option<String> {
        if let Some(MessageContent::Text(text)) = &self.content {
            return Some(text.clone());
        }

        let joined: String = self
            .blocks()
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let has_text = self
            .blocks()
            .iter()
            .any(|block| matches!(block, ContentBlock::Text { .. }));
        has_text.then_some(joined)
    }

    /// Input of the first tool-use block, if any
    pub fn tool_input(&self) -> Option<&Value> {
        self.blocks().iter().find_map(|block| match block {
            ContentBlock::ToolUse { input, .. } => Some(input),
            _ => None,
        })
    }
}
