//! Concrete LLM provider implementations
//!
//! OpenAI, Groq, DeepSeek and Gemini share the OpenAI wire format and are all
//! served by [`OpenAIProvider`]; Anthropic has its own client.

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicProvider;
#[cfg(feature = "openai")]
pub use openai::{OpenAIConfig, OpenAIProvider};

use crate::models::ModelProvider;
use crate::{LLMError, LLMProvider, Result};
use std::sync::Arc;

/// Groq OpenAI-compatible endpoint
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
/// DeepSeek OpenAI-compatible endpoint
pub const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
/// Gemini OpenAI-compatible endpoint
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Build the backend for `provider`, reading its API key from the environment
///
/// A missing key is a configuration error naming the variable to set.
pub fn resolve_provider(provider: ModelProvider) -> Result<Arc<dyn LLMProvider>> {
    let var = provider.api_key_env();
    let api_key = std::env::var(var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            LLMError::ConfigurationError(format!(
                "{} API key not found. Please make sure {var} is set in your .env file.",
                provider.as_str()
            ))
        })?;
    provider_with_key(provider, api_key)
}

/// Build the backend for `provider` with an explicit API key
pub fn provider_with_key(
    provider: ModelProvider,
    api_key: impl Into<String>,
) -> Result<Arc<dyn LLMProvider>> {
    let api_key = api_key.into();
    match provider {
        #[cfg(feature = "anthropic")]
        ModelProvider::Anthropic => Ok(Arc::new(AnthropicProvider::new(api_key)?)),
        #[cfg(feature = "openai")]
        ModelProvider::OpenAI => {
            let api_base = std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| openai::DEFAULT_OPENAI_API_BASE.to_string());
            compatible(api_key, &api_base, "openai")
        }
        #[cfg(feature = "openai")]
        ModelProvider::Groq => compatible(api_key, GROQ_API_BASE, "groq"),
        #[cfg(feature = "openai")]
        ModelProvider::DeepSeek => compatible(api_key, DEEPSEEK_API_BASE, "deepseek"),
        #[cfg(feature = "openai")]
        ModelProvider::Gemini => compatible(api_key, GEMINI_API_BASE, "gemini"),
        #[allow(unreachable_patterns)]
        other => Err(LLMError::ConfigurationError(format!(
            "{} support is not compiled in",
            other.as_str()
        ))),
    }
}

/// Turn a non-success response into an error, reading its body
#[cfg(any(feature = "openai", feature = "anthropic"))]
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await?;
    Err(match status.as_u16() {
        401 | 403 => LLMError::AuthenticationFailed,
        429 => LLMError::RateLimitExceeded(body),
        400 | 422 => LLMError::InvalidRequest(body),
        404 => LLMError::ModelNotFound(model.to_string()),
        _ => LLMError::RequestFailed(format!("HTTP {status}: {body}")),
    })
}

/// Decode a success body, mapping shape mismatches to `UnexpectedResponse`
#[cfg(any(feature = "openai", feature = "anthropic"))]
pub(crate) async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| LLMError::UnexpectedResponse(format!("Failed to parse response: {e}")))
}

#[cfg(feature = "openai")]
fn compatible(api_key: String, api_base: &str, name: &str) -> Result<Arc<dyn LLMProvider>> {
    let config = OpenAIConfig::new(api_key)
        .with_api_base(api_base)
        .with_provider_name(name);
    Ok(Arc::new(OpenAIProvider::with_config(config)?))
}
