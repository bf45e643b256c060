//! Errors raised by providers, prompts and structured extraction

use thiserror::Error;

/// Result alias used across the LLM layer
pub type Result<T> = std::result::Result<T, LLMError>;

/// Failure of a model call, a backend or a prompt
#[derive(Error, Debug)]
pub enum LLMError {
    /// Backend answered with a non-success status
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Backend rejected the credentials
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Backend throttled the call
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Backend refused the request as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model is not served by the backend or absent from the catalog
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Response body did not have the expected shape
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Missing key, unknown provider and the like
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A single attempt exceeded its deadline
    #[error("Attempt timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Prompt template failed to parse or render
    #[error("Template error in '{name}': {detail}")]
    TemplateError {
        /// Template name
        name: String,
        /// Engine message
        detail: String,
    },

    /// Response did not contain a usable JSON payload
    #[error("Could not extract structured output: {0}")]
    ExtractionFailed(String),
}

impl LLMError {
    /// Whether retrying the same request cannot succeed
    ///
    /// Bad credentials, bad configuration, unknown models and rejected
    /// requests fail the same way every time. Everything else (network,
    /// rate limits, malformed output, timeouts) may clear on a retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::ConfigurationError(_)
                | Self::ModelNotFound(_)
                | Self::InvalidRequest(_)
        )
    }
}
