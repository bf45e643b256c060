//! Error types for market data operations

use thiserror::Error;

/// Market data errors
#[derive(Debug, Error)]
pub enum DataError {
    /// The data API answered with a non-success status
    #[error("Error fetching data: {ticker} - {status} - {body}")]
    Api {
        /// Ticker the request was for
        ticker: String,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for market data operations
pub type Result<T> = std::result::Result<T, DataError>;

impl DataError {
    /// Ticker the failure relates to, if known
    pub fn ticker(&self) -> Option<&str> {
        match self {
            Self::Api { ticker, .. } => Some(ticker),
            _ => None,
        }
    }
}

/// Convert DataError to agent_core::Error
impl From<DataError> for agent_core::Error {
    fn from(err: DataError) -> Self {
        agent_core::Error::Data {
            ticker: err.ticker().unwrap_or("unknown").to_string(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataError::Api {
            ticker: "AAPL".to_string(),
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "Error fetching data: AAPL - 429 - slow down");
    }

    #[test]
    fn test_error_conversion() {
        let err = DataError::Api {
            ticker: "MSFT".to_string(),
            status: 500,
            body: "oops".to_string(),
        };
        let agent_err: agent_core::Error = err.into();

        match agent_err {
            agent_core::Error::Data { ticker, detail } => {
                assert_eq!(ticker, "MSFT");
                assert!(detail.contains("500"));
            }
            _ => panic!("Expected Data variant"),
        }

        let agent_err: agent_core::Error = DataError::Config("no key".to_string()).into();
        assert!(matches!(agent_err, agent_core::Error::Data { ticker, .. } if ticker == "unknown"));
    }
}
