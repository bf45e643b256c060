//! Core abstractions for the analyst pipeline
//!
//! This crate defines the types every other crate in the workspace agrees on:
//! the [`Analyst`] trait, the shared [`AgentState`] that flows through a run,
//! the [`AnalystSignal`] each analyst emits per ticker, and the common error type.

pub mod agent;
pub mod error;
pub mod signal;
pub mod state;

pub use agent::{Analyst, AnalystOutput};
pub use error::{Error, Result};
pub use signal::{AnalystSignal, Signal, TickerAnalysis};
pub use state::{AgentState, Metadata, Portfolio, Position};
