//! Typed market data records
//!
//! Field names follow the financial data API's JSON, so records round-trip
//! through the cache unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: i64,
    /// Bar timestamp, ISO 8601
    pub time: String,
}

/// Price API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResponse {
    pub ticker: String,
    pub prices: Vec<Price>,
}

/// Financial ratios for one reporting period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub ticker: String,
    pub report_period: String,
    /// "ttm", "annual" or "quarterly"
    pub period: String,
    pub currency: String,

    // Valuation
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub price_to_earnings_ratio: Option<f64>,
    pub price_to_book_ratio: Option<f64>,
    pub price_to_sales_ratio: Option<f64>,
    pub enterprise_value_to_ebitda_ratio: Option<f64>,
    pub enterprise_value_to_revenue_ratio: Option<f64>,
    pub free_cash_flow_yield: Option<f64>,
    pub peg_ratio: Option<f64>,

    // Profitability
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub return_on_invested_capital: Option<f64>,

    // Efficiency
    pub asset_turnover: Option<f64>,
    pub inventory_turnover: Option<f64>,
    pub receivables_turnover: Option<f64>,
    pub days_sales_outstanding: Option<f64>,
    pub operating_cycle: Option<f64>,
    pub working_capital_turnover: Option<f64>,

    // Liquidity
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub cash_ratio: Option<f64>,
    pub operating_cash_flow_ratio: Option<f64>,

    // Solvency
    pub debt_to_equity: Option<f64>,
    pub debt_to_assets: Option<f64>,
    pub interest_coverage: Option<f64>,

    // Growth
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub book_value_growth: Option<f64>,
    pub earnings_per_share_growth: Option<f64>,
    pub free_cash_flow_growth: Option<f64>,
    pub operating_income_growth: Option<f64>,
    pub ebitda_growth: Option<f64>,

    // Per share
    pub payout_ratio: Option<f64>,
    pub earnings_per_share: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub free_cash_flow_per_share: Option<f64>,
}

/// Financial metrics API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialMetricsResponse {
    pub financial_metrics: Vec<FinancialMetrics>,
}

/// Selected financial statement items for one reporting period
///
/// Only the identifying fields are fixed. The requested items (e.g.
/// `net_income`, `capital_expenditure`) arrive as extra fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub ticker: String,
    pub report_period: String,
    pub period: String,
    pub currency: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl LineItem {
    /// Numeric value of a line item, `None` when absent or null
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.extra.get(name).and_then(Value::as_f64)
    }

    /// Whether the item is present at all (null counts as present)
    pub fn has(&self, name: &str) -> bool {
        self.extra.contains_key(name)
    }

    /// Set a numeric item
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extra.insert(name.into(), Value::from(value));
        self
    }
}

/// Line item search API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemResponse {
    pub search_results: Vec<LineItem>,
}

/// One insider transaction filing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsiderTrade {
    pub ticker: String,
    pub issuer: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub is_board_director: Option<bool>,
    pub transaction_date: Option<String>,
    pub transaction_shares: Option<f64>,
    pub transaction_price_per_share: Option<f64>,
    pub transaction_value: Option<f64>,
    pub shares_owned_before_transaction: Option<f64>,
    pub shares_owned_after_transaction: Option<f64>,
    pub security_title: Option<String>,
    pub filing_date: String,
}

impl InsiderTrade {
    /// Transaction date, or the filing date when the transaction date is missing
    pub fn effective_date(&self) -> &str {
        self.transaction_date.as_deref().unwrap_or(&self.filing_date)
    }
}

/// Insider trade API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsiderTradeResponse {
    pub insider_trades: Vec<InsiderTrade>,
}

/// A news article about a company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyNews {
    pub ticker: String,
    pub title: String,
    pub author: String,
    pub source: String,
    pub date: String,
    pub url: String,
    /// "positive", "negative" or "neutral" when classified
    #[serde(default)]
    pub sentiment: Option<String>,
}

/// Company news API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyNewsResponse {
    pub news: Vec<CompanyNews>,
}

/// Date part (`YYYY-MM-DD`) of an ISO 8601 date or timestamp
pub fn date_part(timestamp: &str) -> &str {
    timestamp.split('T').next().unwrap_or(timestamp)
}
