//! Market data for the analyst pipeline
//!
//! - [`models`]: typed records as returned by the financial data API
//! - [`cache`]: the [`MergeCache`], keyed by record kind and ticker
//! - [`source`] / [`api`]: the [`DataSource`] seam and its REST client
//! - [`fetcher`]: [`DataFetcher`], which consults the cache before the source

pub mod api;
pub mod cache;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod source;

pub use api::FinancialDatasetsClient;
pub use cache::{CacheRecord, CachedRecord, MergeCache, RecordKind, SharedCache, merge};
pub use error::{DataError, Result};
pub use fetcher::{DEFAULT_PAGE_LIMIT, DEFAULT_PERIOD, DEFAULT_PERIOD_LIMIT, DataFetcher};
pub use models::{
    CompanyNews, CompanyNewsResponse, FinancialMetrics, FinancialMetricsResponse, InsiderTrade,
    InsiderTradeResponse, LineItem, LineItemResponse, Price, PriceResponse,
};
pub use source::DataSource;
