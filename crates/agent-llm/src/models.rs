//! Model catalog and descriptors
//!
//! A [`ModelDescriptor`] names a callable backend and records whether it can
//! be coerced into schema-conformant output. DeepSeek models answer with
//! JSON wrapped in a markdown fence instead, so their descriptors select
//! [`ResponseMode::MarkdownJson`].

use crate::structured::ResponseMode;
use crate::{LLMError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported LLM provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelProvider {
    /// OpenAI GPT and o-series models
    OpenAI,
    /// Groq-hosted open models
    Groq,
    /// Anthropic Claude models
    Anthropic,
    /// DeepSeek models
    DeepSeek,
    /// Google Gemini models
    Gemini,
}

impl ModelProvider {
    /// Display name of the provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Groq => "Groq",
            Self::Anthropic => "Anthropic",
            Self::DeepSeek => "DeepSeek",
            Self::Gemini => "Gemini",
        }
    }

    /// Environment variable holding the provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Gemini => "GOOGLE_API_KEY",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProvider {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "groq" => Ok(Self::Groq),
            "anthropic" => Ok(Self::Anthropic),
            "deepseek" => Ok(Self::DeepSeek),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(LLMError::ConfigurationError(format!(
                "Unknown model provider: {other}"
            ))),
        }
    }
}

/// Identifies a callable model backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Human-readable name (e.g. "[openai] gpt-4o")
    pub display_name: String,
    /// Technical model identifier sent to the API
    pub model_name: String,
    /// Backend family
    pub provider: ModelProvider,
    /// Whether the backend can be coerced into schema-conformant JSON
    ///
    /// When `false` the backend returns freeform text with the JSON embedded
    /// in a ```` ```json ```` fence.
    pub structured_output: bool,
}

impl ModelDescriptor {
    /// Create a descriptor, inferring structured-output support from the name
    pub fn new(
        display_name: impl Into<String>,
        model_name: impl Into<String>,
        provider: ModelProvider,
    ) -> Self {
        let model_name = model_name.into();
        let structured_output = !model_name.starts_with("deepseek");
        Self {
            display_name: display_name.into(),
            model_name,
            provider,
            structured_output,
        }
    }

    /// Descriptor for a model that is not in the catalog
    pub fn custom(model_name: impl Into<String>, provider: ModelProvider) -> Self {
        let model_name = model_name.into();
        let display_name = format!("[{}] {model_name}", provider.as_str().to_lowercase());
        Self::new(display_name, model_name, provider)
    }

    /// Override the structured-output flag
    pub fn with_structured_output(mut self, structured: bool) -> Self {
        self.structured_output = structured;
        self
    }

    /// Whether this model belongs to the DeepSeek family
    pub fn is_deepseek(&self) -> bool {
        self.model_name.starts_with("deepseek")
    }

    /// Whether this model belongs to the Gemini family
    pub fn is_gemini(&self) -> bool {
        self.model_name.starts_with("gemini")
    }

    /// Response handling strategy for this backend
    pub fn response_mode(&self) -> ResponseMode {
        if self.structured_output {
            ResponseMode::Structured
        } else {
            ResponseMode::MarkdownJson
        }
    }

    /// `(display name, model name, provider)` for selection menus
    pub fn to_choice_tuple(&self) -> (&str, &str, &str) {
        (&self.display_name, &self.model_name, self.provider.as_str())
    }
}

const CATALOG: &[(&str, &str, ModelProvider)] = &[
    ("[anthropic] claude-3.5-haiku", "claude-3-5-haiku-latest", ModelProvider::Anthropic),
    ("[anthropic] claude-3.5-sonnet", "claude-3-5-sonnet-latest", ModelProvider::Anthropic),
    ("[anthropic] claude-3.7-sonnet", "claude-3-7-sonnet-latest", ModelProvider::Anthropic),
    ("[deepseek] deepseek-r1", "deepseek-reasoner", ModelProvider::DeepSeek),
    ("[deepseek] deepseek-v3", "deepseek-chat", ModelProvider::DeepSeek),
    ("[gemini] gemini-2.0-flash", "gemini-2.0-flash", ModelProvider::Gemini),
    ("[gemini] gemini-2.0-pro", "gemini-2.0-pro-exp-02-05", ModelProvider::Gemini),
    ("[groq] llama-3.3 70b", "llama-3.3-70b-versatile", ModelProvider::Groq),
    ("[openai] gpt-4o", "gpt-4o", ModelProvider::OpenAI),
    ("[openai] o1", "o1", ModelProvider::OpenAI),
    ("[openai] o3-mini", "o3-mini", ModelProvider::OpenAI),
];

/// All models known to the pipeline, in menu order
pub fn available_models() -> Vec<ModelDescriptor> {
    CATALOG
        .iter()
        .map(|(display, name, provider)| ModelDescriptor::new(*display, *name, *provider))
        .collect()
}

/// Look up a catalog model by its technical name
pub fn find_model(model_name: &str) -> Option<ModelDescriptor> {
    available_models()
        .into_iter()
        .find(|m| m.model_name == model_name)
}

/// Resolve a descriptor from a model name and optional provider
///
/// Catalog models need no provider. Unknown models are accepted when a
/// provider is given, so new model versions work without a catalog update.
/// An explicit provider that disagrees with the catalog wins.
pub fn resolve_descriptor(
    model_name: &str,
    provider: Option<ModelProvider>,
) -> Result<ModelDescriptor> {
    match (find_model(model_name), provider) {
        (Some(found), Some(p)) if found.provider != p => Ok(ModelDescriptor::custom(model_name, p)),
        (Some(found), _) => Ok(found),
        (None, Some(p)) => Ok(ModelDescriptor::custom(model_name, p)),
        (None, None) => Err(LLMError::ModelNotFound(format!(
            "{model_name} is not in the catalog; pass a provider explicitly"
        ))),
    }
}
