//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// Trait for LLM providers
///
/// A provider is one model backend family (OpenAI, Anthropic, or any
/// OpenAI-compatible endpoint such as Groq, DeepSeek or Gemini). It performs
/// exactly one network round trip per call; retries and output coercion live
/// in [`LlmInvoker`](crate::LlmInvoker).
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider name (e.g., "anthropic", "groq")
    fn name(&self) -> &str;
}
