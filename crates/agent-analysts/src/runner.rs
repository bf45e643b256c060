//! Sequential analyst orchestration

use crate::progress::ProgressTracker;
use agent_core::{AgentState, Analyst, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Runs analysts one after another over the same state
pub struct AnalysisRunner {
    analysts: Vec<Arc<dyn Analyst>>,
    progress: Arc<ProgressTracker>,
}

impl AnalysisRunner {
    /// Create a runner over `analysts`, in the order given
    pub fn new(analysts: Vec<Arc<dyn Analyst>>, progress: Arc<ProgressTracker>) -> Self {
        Self { analysts, progress }
    }

    /// Analyst keys in run order
    pub fn keys(&self) -> Vec<&str> {
        self.analysts.iter().map(|a| a.key()).collect()
    }

    /// Run every analyst and merge its signals into `state`
    ///
    /// A data failure stops the run; LLM failures never do, since analysts
    /// fall back to a default signal.
    pub async fn run(&self, mut state: AgentState) -> Result<AgentState> {
        info!(
            tickers = ?state.tickers,
            analysts = ?self.keys(),
            start = %state.start_str(),
            end = %state.end_str(),
            "Starting analysis run"
        );
        let started = Instant::now();

        for analyst in &self.analysts {
            match analyst.analyze(&state).await {
                Ok(signals) => {
                    info!(
                        analyst = analyst.key(),
                        signals = signals.len(),
                        "Analyst finished"
                    );
                    state.merge_signals(analyst.key(), signals);
                }
                Err(e) => {
                    error!(analyst = analyst.key(), error = %e, "Analyst failed");
                    self.progress.update_status(analyst.key(), None, "Error");
                    return Err(e);
                }
            }
        }

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "Analysis run complete");
        Ok(state)
    }
}

impl std::fmt::Debug for AnalysisRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisRunner")
            .field("analysts", &self.keys())
            .finish_non_exhaustive()
    }
}
