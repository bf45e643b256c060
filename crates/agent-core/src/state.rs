//! Shared state for one pipeline run
//!
//! `AgentState` carries the run parameters (tickers, date window, portfolio,
//! model selection) into every analyst and collects their signals on the way
//! out. Signals are merged per analyst: a later write for the same
//! `(analyst, ticker)` pair replaces the earlier one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{AnalystSignal, TickerAnalysis};

/// A holding in a single security
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Cash associated with the position
    #[serde(default)]
    pub cash: f64,
    /// Number of shares owned
    #[serde(default)]
    pub shares: i64,
    /// Stock symbol
    pub ticker: String,
}

/// Positions plus free cash
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Ticker -> position
    pub positions: BTreeMap<String, Position>,
    /// Uninvested cash
    #[serde(default)]
    pub total_cash: f64,
}

impl Portfolio {
    /// Portfolio with an empty position for each ticker and the given cash
    pub fn with_cash(tickers: &[String], total_cash: f64) -> Self {
        let positions = tickers
            .iter()
            .map(|t| {
                (
                    t.clone(),
                    Position {
                        ticker: t.clone(),
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self {
            positions,
            total_cash,
        }
    }
}

/// Run-level settings visible to analysts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Print each analyst's reasoning after it finishes
    #[serde(default)]
    pub show_reasoning: bool,
    /// Technical model identifier
    pub model_name: String,
    /// Provider tag of the model
    pub model_provider: String,
}

/// State handed to analysts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Tickers under analysis
    pub tickers: Vec<String>,
    /// Start of the analysis window
    pub start_date: NaiveDate,
    /// End of the analysis window
    pub end_date: NaiveDate,
    /// Current portfolio
    #[serde(default)]
    pub portfolio: Portfolio,
    /// Analyst key -> ticker -> signal
    #[serde(default)]
    pub analyst_signals: BTreeMap<String, BTreeMap<String, AnalystSignal>>,
    /// Run settings
    pub metadata: Metadata,
}

impl AgentState {
    /// Create state for the given tickers and date window
    pub fn new(
        tickers: Vec<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        metadata: Metadata,
    ) -> Self {
        let portfolio = Portfolio::with_cash(&tickers, 0.0);
        Self {
            tickers,
            start_date,
            end_date,
            portfolio,
            analyst_signals: BTreeMap::new(),
            metadata,
        }
    }

    /// Merge an analyst's signals into the state
    ///
    /// Tickers already recorded for this analyst are overwritten; other
    /// tickers and other analysts are left alone.
    pub fn merge_signals(
        &mut self,
        analyst: impl Into<String>,
        signals: BTreeMap<String, AnalystSignal>,
    ) {
        self.analyst_signals
            .entry(analyst.into())
            .or_default()
            .extend(signals);
    }

    /// Signal one analyst produced for one ticker
    pub fn signal(&self, analyst: &str, ticker: &str) -> Option<&AnalystSignal> {
        self.analyst_signals.get(analyst)?.get(ticker)
    }

    /// Regroup signals by ticker, in the order tickers were requested
    pub fn ticker_analyses(&self) -> Vec<TickerAnalysis> {
        self.tickers
            .iter()
            .map(|ticker| TickerAnalysis {
                ticker: ticker.clone(),
                analyst_signals: self
                    .analyst_signals
                    .iter()
                    .filter_map(|(analyst, by_ticker)| {
                        by_ticker.get(ticker).map(|s| (analyst.clone(), s.clone()))
                    })
                    .collect(),
            })
            .collect()
    }

    /// Start date formatted as `YYYY-MM-DD`
    pub fn start_str(&self) -> String {
        self.start_date.format("%Y-%m-%d").to_string()
    }

    /// End date formatted as `YYYY-MM-DD`
    pub fn end_str(&self) -> String {
        self.end_date.format("%Y-%m-%d").to_string()
    }
}
