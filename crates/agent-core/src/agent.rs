//! Core Analyst trait definition

use crate::{AgentState, AnalystSignal, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Ticker -> signal, as produced by one analyst in one run
pub type AnalystOutput = BTreeMap<String, AnalystSignal>;

/// Core trait that all analysts must implement
///
/// An analyst reads the run parameters from [`AgentState`] and returns one
/// signal per ticker. It does not write to the state itself; the orchestrator
/// merges the output under [`Analyst::key`].
#[async_trait]
pub trait Analyst: Send + Sync {
    /// Analyze every ticker in the state
    async fn analyze(&self, state: &AgentState) -> Result<AnalystOutput>;

    /// Stable key used in state and progress output (e.g. `warren_buffett_agent`)
    fn key(&self) -> &str;

    /// Human-readable name
    fn display_name(&self) -> &str;
}
