//! Configuration for analysis runs

use agent_core::{Error, Metadata, Result};
use agent_data::api::{API_KEY_ENV, DEFAULT_BASE_URL};
use agent_llm::models::{ModelDescriptor, ModelProvider, resolve_descriptor};
use agent_llm::retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default model when none is chosen
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Technical model name (e.g. `gpt-4o`)
    pub model_name: String,

    /// Provider override; catalog models resolve their own
    pub model_provider: Option<ModelProvider>,

    /// Attempts per LLM invocation
    pub max_attempts: u32,

    /// Wait before the second attempt, doubling after; zero retries immediately
    pub retry_backoff: Duration,

    /// Deadline for a single LLM call
    pub attempt_timeout: Option<Duration>,

    /// Stop retrying on authentication and configuration errors
    pub fail_fast: bool,

    /// Token limit per LLM call
    pub max_tokens: usize,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Print each analyst's reasoning after the run
    pub show_reasoning: bool,

    /// Financial Datasets API key (optional)
    pub financial_datasets_api_key: Option<String>,

    /// Financial Datasets endpoint
    pub financial_datasets_base_url: String,

    /// Financial Datasets requests per minute
    pub rate_limit_per_minute: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            model_provider: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::ZERO,
            attempt_timeout: None,
            fail_fast: false,
            max_tokens: 2048,
            temperature: None,
            show_reasoning: false,
            financial_datasets_api_key: None,
            financial_datasets_base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_per_minute: 60,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Load the Financial Datasets API key from the environment
    pub fn with_env_keys(mut self) -> Self {
        if let Some(key) = env_key() {
            self.financial_datasets_api_key = Some(key);
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InitializationFailed(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_per_minute == 0 {
            return Err(Error::InitializationFailed(
                "rate_limit_per_minute must be greater than 0".to_string(),
            ));
        }

        self.descriptor()?;
        Ok(())
    }

    /// Resolve the configured model against the catalog
    pub fn descriptor(&self) -> Result<ModelDescriptor> {
        resolve_descriptor(&self.model_name, self.model_provider)
            .map_err(|e| Error::InitializationFailed(e.to_string()))
    }

    /// Retry policy for LLM invocations
    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::new(self.max_attempts);
        if !self.retry_backoff.is_zero() {
            policy = policy.with_backoff(self.retry_backoff, Duration::from_secs(10), 2.0);
        }
        if let Some(timeout) = self.attempt_timeout {
            policy = policy.with_attempt_timeout(timeout);
        }
        if self.fail_fast {
            policy = policy.fail_fast();
        }
        policy
    }

    /// Run metadata recorded in the pipeline state
    pub fn metadata(&self) -> Result<Metadata> {
        let descriptor = self.descriptor()?;
        Ok(Metadata {
            show_reasoning: self.show_reasoning,
            model_name: descriptor.model_name,
            model_provider: descriptor.provider.as_str().to_string(),
        })
    }
}

fn env_key() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Builder for AnalysisConfig
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    model_name: Option<String>,
    model_provider: Option<ModelProvider>,
    max_attempts: Option<u32>,
    retry_backoff: Option<Duration>,
    attempt_timeout: Option<Duration>,
    fail_fast: bool,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    show_reasoning: bool,
    financial_datasets_api_key: Option<String>,
    financial_datasets_base_url: Option<String>,
    rate_limit_per_minute: Option<u32>,
}

impl AnalysisConfigBuilder {
    /// Set the model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    /// Set the model provider
    pub fn provider(mut self, provider: ModelProvider) -> Self {
        self.model_provider = Some(provider);
        self
    }

    /// Set attempts per LLM invocation
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the initial retry backoff
    pub fn retry_backoff(mut self, duration: Duration) -> Self {
        self.retry_backoff = Some(duration);
        self
    }

    /// Set the per-call deadline
    pub fn attempt_timeout(mut self, duration: Duration) -> Self {
        self.attempt_timeout = Some(duration);
        self
    }

    /// Stop retrying on errors that cannot clear
    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Set the token limit per call
    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Print reasoning after the run
    pub fn show_reasoning(mut self, enabled: bool) -> Self {
        self.show_reasoning = enabled;
        self
    }

    /// Set the Financial Datasets API key
    pub fn financial_datasets_api_key(mut self, key: impl Into<String>) -> Self {
        self.financial_datasets_api_key = Some(key.into());
        self
    }

    /// Set the Financial Datasets endpoint
    pub fn financial_datasets_base_url(mut self, url: impl Into<String>) -> Self {
        self.financial_datasets_base_url = Some(url.into());
        self
    }

    /// Set the request rate limit
    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    /// Load the Financial Datasets API key from the environment
    pub fn with_env_keys(mut self) -> Self {
        if let Some(key) = env_key() {
            self.financial_datasets_api_key = Some(key);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        let defaults = AnalysisConfig::default();

        let config = AnalysisConfig {
            model_name: self.model_name.unwrap_or(defaults.model_name),
            model_provider: self.model_provider,
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            retry_backoff: self.retry_backoff.unwrap_or(defaults.retry_backoff),
            attempt_timeout: self.attempt_timeout,
            fail_fast: self.fail_fast,
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature,
            show_reasoning: self.show_reasoning,
            financial_datasets_api_key: self.financial_datasets_api_key,
            financial_datasets_base_url: self
                .financial_datasets_base_url
                .unwrap_or(defaults.financial_datasets_base_url),
            rate_limit_per_minute: self
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
        };

        config.validate()?;
        Ok(config)
    }
}
