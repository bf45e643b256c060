//! Shared services handed to analysts

use crate::config::AnalysisConfig;
use crate::progress::ProgressTracker;
use agent_core::{Error, Result};
use agent_data::{DataFetcher, DataSource, FinancialDatasetsClient, MergeCache};
use agent_llm::providers::resolve_provider;
use agent_llm::{LLMProvider, LlmInvoker};
use std::sync::Arc;

/// Data access, LLM invoker and progress board for one run
#[derive(Debug, Clone)]
pub struct AnalystContext {
    /// Cache-consulting market data access
    pub fetcher: DataFetcher,
    /// Structured LLM invocation
    pub invoker: Arc<LlmInvoker>,
    /// Status board, also the invoker's attempt callback
    pub progress: Arc<ProgressTracker>,
}

impl AnalystContext {
    /// Assemble a context from parts
    pub fn new(fetcher: DataFetcher, invoker: Arc<LlmInvoker>, progress: Arc<ProgressTracker>) -> Self {
        Self {
            fetcher,
            invoker,
            progress,
        }
    }

    /// Build a context from configuration
    ///
    /// The model backend is resolved here, so a missing provider API key
    /// fails before any analyst runs.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let descriptor = config.descriptor()?;
        let provider = resolve_provider(descriptor.provider)
            .map_err(|e| Error::InitializationFailed(e.to_string()))?;
        let client = FinancialDatasetsClient::new(
            config.financial_datasets_api_key.clone(),
            config.rate_limit_per_minute,
        )?
        .with_base_url(config.financial_datasets_base_url.clone());

        Self::with_backends(config, provider, Arc::new(client))
    }

    /// Build a context over explicit backends
    pub fn with_backends(
        config: &AnalysisConfig,
        provider: Arc<dyn LLMProvider>,
        source: Arc<dyn DataSource>,
    ) -> Result<Self> {
        let progress = Arc::new(ProgressTracker::new());

        let mut invoker = LlmInvoker::new(provider, config.descriptor()?)
            .with_retry_policy(config.retry_policy())
            .with_status_callback(progress.clone())
            .with_max_tokens(config.max_tokens);
        if let Some(temperature) = config.temperature {
            invoker = invoker.with_temperature(temperature);
        }

        let fetcher = DataFetcher::new(source, MergeCache::shared());
        Ok(Self::new(fetcher, Arc::new(invoker), progress))
    }
}
