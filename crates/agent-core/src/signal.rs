//! Investment signals emitted by analysts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Directional view an analyst takes on a ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Expect the price to rise
    Bullish,
    /// Expect the price to fall
    Bearish,
    /// No strong view either way
    Neutral,
}

impl Signal {
    /// All signal values, in the order they are declared to the model
    pub const ALL: [&'static str; 3] = ["bullish", "bearish", "neutral"];

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bullish" => Ok(Self::Bullish),
            "bearish" => Ok(Self::Bearish),
            "neutral" => Ok(Self::Neutral),
            other => Err(format!("Unknown signal: {other}")),
        }
    }
}

/// Signal produced by one analyst for one ticker
///
/// Every field is optional so that partial results fit the same shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalystSignal {
    /// Directional call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,

    /// Confidence in percent (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Free-form explanation, either a string or structured JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<serde_json::Value>,
}

impl AnalystSignal {
    /// Create a signal with a directional call, confidence and textual reasoning
    pub fn new(signal: Signal, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            signal: Some(signal),
            confidence: Some(confidence),
            reasoning: Some(serde_json::Value::String(reasoning.into())),
        }
    }

    /// Reasoning rendered as a single line of text
    pub fn reasoning_text(&self) -> String {
        match &self.reasoning {
            None => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// All analyst signals collected for a single ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerAnalysis {
    /// Stock symbol
    pub ticker: String,
    /// Analyst key -> signal
    pub analyst_signals: BTreeMap<String, AnalystSignal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_parsing() {
        assert_eq!("bullish".parse::<Signal>(), Ok(Signal::Bullish));
        assert_eq!(" Bearish ".parse::<Signal>(), Ok(Signal::Bearish));
        assert_eq!("NEUTRAL".parse::<Signal>(), Ok(Signal::Neutral));
        assert!("sideways".parse::<Signal>().is_err());
    }

    #[test]
    fn test_signal_serde_is_lowercase() {
        let json = serde_json::to_string(&Signal::Bullish).unwrap();
        assert_eq!(json, "\"bullish\"");

        let parsed: Signal = serde_json::from_str("\"neutral\"").unwrap();
        assert_eq!(parsed, Signal::Neutral);
    }

    #[test]
    fn test_analyst_signal_skips_empty_fields() {
        let signal = AnalystSignal::new(Signal::Bearish, 42.0, "High debt");
        let json = serde_json::to_value(&signal).unwrap();

        assert_eq!(json["signal"], "bearish");
        assert_eq!(json["confidence"], 42.0);
        assert_eq!(signal.reasoning_text(), "High debt");
    }

    #[test]
    fn test_structured_reasoning_text() {
        let signal = AnalystSignal {
            reasoning: Some(serde_json::json!({"score": 7})),
            ..Default::default()
        };
        assert_eq!(signal.reasoning_text(), r#"{"score":7}"#);
    }
}
