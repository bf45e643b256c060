//! Per-analyst progress tracking
//!
//! Analysts report what they are doing through [`ProgressTracker::update_status`].
//! The tracker keeps the latest status per analyst and mirrors every update to
//! `tracing`. It also implements [`StatusCallback`], so failed LLM attempts
//! (`"Error - retry 1/3"`) land in the same place.

use crate::registry::find_analyst;
use agent_llm::StatusCallback;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Latest status of one analyst
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentStatus {
    /// Ticker last worked on
    pub ticker: Option<String>,
    /// Last status text
    pub status: String,
}

impl AgentStatus {
    /// Whether the analyst reported completion
    pub fn is_done(&self) -> bool {
        self.status.eq_ignore_ascii_case("done")
    }

    /// Whether the last update reported a failure
    pub fn is_error(&self) -> bool {
        self.status.to_lowercase().starts_with("error")
    }
}

/// Status board shared by all analysts in a run
#[derive(Debug, Default)]
pub struct ProgressTracker {
    statuses: Mutex<BTreeMap<String, AgentStatus>>,
}

impl ProgressTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status update
    ///
    /// A `None` ticker or an empty status leaves the previous value in place.
    pub fn update_status(&self, agent: &str, ticker: Option<&str>, status: &str) {
        {
            let mut statuses = self
                .statuses
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let entry = statuses.entry(agent.to_string()).or_default();
            if let Some(ticker) = ticker {
                entry.ticker = Some(ticker.to_string());
            }
            if !status.is_empty() {
                entry.status = status.to_string();
            }
        }

        let ticker = ticker.unwrap_or("-");
        if status.eq_ignore_ascii_case("done") {
            info!(agent, ticker, "Analysis complete");
        } else if status.to_lowercase().starts_with("error") {
            warn!(agent, ticker, status, "Analyst reported an error");
        } else {
            debug!(agent, ticker, status);
        }
    }

    /// Latest status of `agent`
    pub fn status(&self, agent: &str) -> Option<AgentStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(agent)
            .cloned()
    }

    /// All statuses, registered analysts in run order, then any others by name
    pub fn snapshot(&self) -> Vec<(String, AgentStatus)> {
        let mut entries: Vec<(String, AgentStatus)> = self
            .statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(agent, status)| (agent.clone(), status.clone()))
            .collect();
        entries.sort_by_key(|(agent, _)| (run_order(agent), agent.clone()));
        entries
    }

    /// One line per analyst, e.g. `✓ Warren Buffett        [AAPL] Done`
    pub fn render(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|(agent, status)| render_line(agent, status))
            .collect()
    }
}

impl StatusCallback for ProgressTracker {
    fn on_attempt_failed(&self, agent: &str, ticker: Option<&str>, message: &str) {
        self.update_status(agent, ticker, message);
    }
}

fn run_order(agent: &str) -> u32 {
    find_analyst(agent.trim_end_matches("_agent")).map_or(u32::MAX, |entry| entry.order)
}

/// `warren_buffett_agent` -> `Warren Buffett`
pub fn display_label(agent: &str) -> String {
    agent
        .trim_end_matches("_agent")
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn render_line(agent: &str, status: &AgentStatus) -> String {
    let symbol = if status.is_done() {
        '✓'
    } else if status.is_error() {
        '✗'
    } else {
        '⋯'
    };

    let mut line = format!("{symbol} {:<20}", display_label(agent));
    if let Some(ticker) = &status.ticker {
        line.push_str(&format!("[{ticker}] "));
    }
    line.push_str(&status.status);
    line
}
