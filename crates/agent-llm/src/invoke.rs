//! Reliable structured LLM invocation
//!
//! [`LlmInvoker`] wraps one backend and turns a prompt into a typed value. It
//! runs a bounded attempt loop, coerces each answer into the target type, and
//! reports every failed attempt through a [`StatusCallback`]. When all
//! attempts fail it returns a fallback value instead of an error, so callers
//! always get a complete result.
//!
//! ```text
//! Start -> Attempting(1) -> Success
//!                        -> Attempting(2) -> ... -> Attempting(max) -> Success
//!                                                                    -> ExhaustedFallback
//! ```

use crate::models::ModelDescriptor;
use crate::prompt::Prompt;
use crate::retry::RetryPolicy;
use crate::schema::StructuredOutput;
use crate::structured::ResponseMode;
use crate::{CompletionRequest, LLMError, LLMProvider, Result};
use std::fmt;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

/// Receives a notice for every failed attempt
pub trait StatusCallback: Send + Sync {
    /// Called once per failed attempt with a message like `"Error - retry 2/3"`
    fn on_attempt_failed(&self, agent: &str, ticker: Option<&str>, message: &str);
}

impl<F> StatusCallback for F
where
    F: Fn(&str, Option<&str>, &str) + Send + Sync,
{
    fn on_attempt_failed(&self, agent: &str, ticker: Option<&str>, message: &str) {
        self(agent, ticker, message);
    }
}

/// Identifies who is calling, for callbacks and logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLabel {
    /// Agent or analyst name
    pub agent: String,
    /// Ticker being analyzed, if any
    pub ticker: Option<String>,
}

impl CallLabel {
    /// Label without a ticker
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            ticker: None,
        }
    }

    /// Label for one ticker
    pub fn for_ticker(agent: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            ticker: Some(ticker.into()),
        }
    }
}

impl fmt::Display for CallLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ticker {
            Some(ticker) => write!(f, "{}[{ticker}]", self.agent),
            None => f.write_str(&self.agent),
        }
    }
}

/// Structured invocation over one backend
#[derive(Clone)]
pub struct LlmInvoker {
    provider: Arc<dyn LLMProvider>,
    model: ModelDescriptor,
    policy: RetryPolicy,
    callback: Option<Arc<dyn StatusCallback>>,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl LlmInvoker {
    /// Create an invoker with the default retry policy and no callback
    pub fn new(provider: Arc<dyn LLMProvider>, model: ModelDescriptor) -> Self {
        Self {
            provider,
            model,
            policy: RetryPolicy::default(),
            callback: None,
            max_tokens: 2048,
            temperature: None,
        }
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the status callback
    pub fn with_status_callback(mut self, callback: Arc<dyn StatusCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Set the token limit per call
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Backend descriptor
    pub fn model(&self) -> &ModelDescriptor {
        &self.model
    }

    /// Active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Produce a `T`, falling back to its synthesised default
    pub async fn invoke<T: StructuredOutput>(&self, prompt: &Prompt, label: &CallLabel) -> T {
        self.invoke_or(prompt, label, T::synthesize_default).await
    }

    /// Produce a `T`, falling back to `fallback()` once every attempt failed
    pub async fn invoke_or<T, F>(&self, prompt: &Prompt, label: &CallLabel, fallback: F) -> T
    where
        T: StructuredOutput,
        F: FnOnce() -> T,
    {
        match self.try_invoke(prompt, label).await {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    label = %label,
                    model = %self.model.model_name,
                    error = %e,
                    "All LLM attempts failed, using fallback"
                );
                fallback()
            }
        }
    }

    /// Run the attempt loop and return the last error on exhaustion
    #[instrument(skip(self, prompt), fields(model = %self.model.model_name))]
    pub async fn try_invoke<T: StructuredOutput>(
        &self,
        prompt: &Prompt,
        label: &CallLabel,
    ) -> Result<T> {
        let mode = self.model.response_mode();
        let request = self.build_request::<T>(mode, prompt);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let backoff = self.policy.backoff_duration(attempt);
            if !backoff.is_zero() {
                debug!("Waiting {:?} before attempt {}", backoff, attempt + 1);
                sleep(backoff).await;
            }

            debug!(
                "Attempt {}/{} via {} ({:?})",
                attempt + 1,
                max_attempts,
                self.provider.name(),
                mode
            );

            match self.attempt::<T>(mode, request.clone()).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded after {} retries", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        "LLM call for {} failed (attempt {}/{}): {}",
                        label,
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    self.report(label, &format!("Error - retry {}/{max_attempts}", attempt + 1));

                    let retry = self.policy.should_retry(&e, attempt);
                    last_error = Some(e);
                    if !retry {
                        break;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LLMError::RequestFailed("no attempt was made".to_string())))
    }

    fn build_request<T: StructuredOutput>(
        &self,
        mode: ResponseMode,
        prompt: &Prompt,
    ) -> CompletionRequest {
        let mut builder = prompt
            .to_request(&self.model.model_name)
            .max_tokens(self.max_tokens);
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        mode.prepare::<T>(builder).build()
    }

    async fn attempt<T: StructuredOutput>(
        &self,
        mode: ResponseMode,
        request: CompletionRequest,
    ) -> Result<T> {
        let call = self.provider.complete(request);
        let response = match self.policy.attempt_timeout {
            Some(limit) => timeout(limit, call)
                .await
                .map_err(|_| LLMError::Timeout(limit))??,
            None => call.await?,
        };
        debug!(tokens = response.usage.total(), stop = ?response.stop_reason, "LLM response");
        mode.extract(&response)
    }

    fn report(&self, label: &CallLabel, message: &str) {
        if let Some(callback) = &self.callback {
            callback.on_attempt_failed(&label.agent, label.ticker.as_deref(), message);
        }
    }
}

impl fmt::Debug for LlmInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmInvoker")
            .field("provider", &self.provider.name())
            .field("model", &self.model.model_name)
            .field("policy", &self.policy)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}
