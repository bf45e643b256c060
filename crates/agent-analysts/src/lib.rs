//! Investor-style analysts for the analyst pipeline
//!
//! An analyst fetches market data through [`agent_data::DataFetcher`], scores
//! each ticker with its own heuristics and asks a model for the final call
//! through [`agent_llm::LlmInvoker`]. The [`registry`] names the available
//! analysts and [`AnalysisRunner`] runs a selection of them over an
//! [`agent_core::AgentState`].

pub mod config;
pub mod context;
pub mod progress;
pub mod registry;
pub mod runner;
pub mod warren_buffett;

pub use config::{AnalysisConfig, AnalysisConfigBuilder, DEFAULT_MODEL};
pub use context::AnalystContext;
pub use progress::{AgentStatus, ProgressTracker, display_label};
pub use registry::{AnalystEntry, analyst_order, build_analysts, find_analyst};
pub use runner::AnalysisRunner;
pub use warren_buffett::{WarrenBuffettAnalyst, WarrenBuffettSignal};
