//! Errors surfaced by analysts and the pipeline

use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for analyst operations
#[derive(Error, Debug)]
pub enum Error {
    /// Analyst initialization failed
    #[error("Analyst initialization failed: {0}")]
    InitializationFailed(String),

    /// Analyst processing failed
    #[error("Analyst processing failed: {0}")]
    ProcessingFailed(String),

    /// Requested analyst key is not registered
    #[error("Unknown analyst: {0}")]
    UnknownAnalyst(String),

    /// Upstream market data could not be fetched
    #[error("Data error for {ticker}: {detail}")]
    Data {
        /// Ticker the fetch was for
        ticker: String,
        /// Underlying failure
        detail: String,
    },
}
