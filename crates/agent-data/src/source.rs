//! Upstream market data source
//!
//! A [`DataSource`] performs exactly one request per call and knows nothing
//! about caching or pagination; [`DataFetcher`](crate::DataFetcher) layers
//! both on top.

use crate::error::Result;
use crate::models::{CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of raw market data
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Daily prices between `start` and `end`, inclusive
    async fn fetch_prices(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
    -> Result<Vec<Price>>;

    /// Up to `limit` metric snapshots reported on or before `end`
    async fn fetch_financial_metrics(
        &self,
        ticker: &str,
        end: NaiveDate,
        period: &str,
        limit: usize,
    ) -> Result<Vec<FinancialMetrics>>;

    /// Up to `limit` periods of the named statement items, on or before `end`
    async fn search_line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        end: NaiveDate,
        period: &str,
        limit: usize,
    ) -> Result<Vec<LineItem>>;

    /// One page of insider trades filed on or before `end`
    async fn fetch_insider_trades(
        &self,
        ticker: &str,
        end: NaiveDate,
        start: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<InsiderTrade>>;

    /// One page of news published on or before `end`
    async fn fetch_company_news(
        &self,
        ticker: &str,
        end: NaiveDate,
        start: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<CompanyNews>>;
}
