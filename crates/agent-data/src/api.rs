//! Financial Datasets REST client
//!
//! See: https://docs.financialdatasets.ai

use crate::error::{DataError, Result};
use crate::models::{
    CompanyNews, CompanyNewsResponse, FinancialMetrics, FinancialMetricsResponse, InsiderTrade,
    InsiderTradeResponse, LineItem, LineItemResponse, Price, PriceResponse,
};
use crate::source::DataSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.financialdatasets.ai";

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "FINANCIAL_DATASETS_API_KEY";

const DEFAULT_RATE_LIMIT: u32 = 60;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Financial Datasets API client
#[derive(Debug, Clone)]
pub struct FinancialDatasetsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: SharedRateLimiter,
}

impl FinancialDatasetsClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `api_key` - API key; some tickers are served without one
    /// * `rate_limit` - Maximum requests per minute
    pub fn new(api_key: Option<String>, rate_limit: u32) -> Result<Self> {
        let quota = Quota::per_minute(
            NonZeroU32::new(rate_limit)
                .or(NonZeroU32::new(DEFAULT_RATE_LIMIT))
                .unwrap_or(NonZeroU32::MIN),
        );
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Create from `FINANCIAL_DATASETS_API_KEY` with the default rate limit
    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var(API_KEY_ENV).ok(), DEFAULT_RATE_LIMIT)
    }

    /// Use a different endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether requests carry an API key
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send<T: DeserializeOwned>(&self, ticker: &str, request: RequestBuilder) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let request = match &self.api_key {
            Some(key) => request.header("X-API-KEY", key),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::Api {
                ticker: ticker.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl DataSource for FinancialDatasetsClient {
    #[instrument(skip(self))]
    async fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Price>> {
        let request = self.client.get(self.url("/prices/")).query(&[
            ("ticker", ticker.to_string()),
            ("interval", "day".to_string()),
            ("interval_multiplier", "1".to_string()),
            ("start_date", iso(start)),
            ("end_date", iso(end)),
        ]);
        let response: PriceResponse = self.send(ticker, request).await?;
        debug!("Fetched {} prices", response.prices.len());
        Ok(response.prices)
    }

    #[instrument(skip(self))]
    async fn fetch_financial_metrics(
        &self,
        ticker: &str,
        end: NaiveDate,
        period: &str,
        limit: usize,
    ) -> Result<Vec<FinancialMetrics>> {
        let request = self.client.get(self.url("/financial-metrics/")).query(&[
            ("ticker", ticker.to_string()),
            ("report_period_lte", iso(end)),
            ("limit", limit.to_string()),
            ("period", period.to_string()),
        ]);
        let response: FinancialMetricsResponse = self.send(ticker, request).await?;
        debug!("Fetched {} metric snapshots", response.financial_metrics.len());
        Ok(response.financial_metrics)
    }

    #[instrument(skip(self, line_items), fields(items = line_items.len()))]
    async fn search_line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        end: NaiveDate,
        period: &str,
        limit: usize,
    ) -> Result<Vec<LineItem>> {
        let body = json!({
            "tickers": [ticker],
            "line_items": line_items,
            "end_date": iso(end),
            "period": period,
            "limit": limit,
        });
        let request = self
            .client
            .post(self.url("/financials/search/line-items"))
            .json(&body);
        let response: LineItemResponse = self.send(ticker, request).await?;

        let mut results = response.search_results;
        results.truncate(limit);
        debug!("Fetched {} line item periods", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn fetch_insider_trades(
        &self,
        ticker: &str,
        end: NaiveDate,
        start: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<InsiderTrade>> {
        let mut query = vec![
            ("ticker", ticker.to_string()),
            ("filing_date_lte", iso(end)),
        ];
        if let Some(start) = start {
            query.push(("filing_date_gte", iso(start)));
        }
        query.push(("limit", limit.to_string()));

        let request = self.client.get(self.url("/insider-trades/")).query(&query);
        let response: InsiderTradeResponse = self.send(ticker, request).await?;
        debug!("Fetched {} insider trades", response.insider_trades.len());
        Ok(response.insider_trades)
    }

    #[instrument(skip(self))]
    async fn fetch_company_news(
        &self,
        ticker: &str,
        end: NaiveDate,
        start: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<CompanyNews>> {
        let mut query = vec![("ticker", ticker.to_string()), ("end_date", iso(end))];
        if let Some(start) = start {
            query.push(("start_date", iso(start)));
        }
        query.push(("limit", limit.to_string()));

        let request = self.client.get(self.url("/news/")).query(&query);
        let response: CompanyNewsResponse = self.send(ticker, request).await?;
        debug!("Fetched {} news articles", response.news.len());
        Ok(response.news)
    }
}
