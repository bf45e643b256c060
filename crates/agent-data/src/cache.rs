//! Merge cache for market data responses
//!
//! Records are kept per kind and per ticker. Each kind has an identity field
//! (`time` for prices, `report_period` for metrics and line items,
//! `filing_date` for insider trades, `date` for news), and a bucket never
//! holds two records with the same identity value. New records are merged
//! in; a record whose identity is already present is dropped and the cached
//! one is kept.

use crate::error::Result;
use crate::models::{CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An untyped cached record (a JSON object)
pub type CachedRecord = Value;

/// Cache handle shared between fetchers and analysts
pub type SharedCache = Arc<RwLock<MergeCache>>;

/// Kind of cached record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Prices,
    FinancialMetrics,
    LineItems,
    InsiderTrades,
    CompanyNews,
}

impl RecordKind {
    /// All record kinds
    pub const ALL: [Self; 5] = [
        Self::Prices,
        Self::FinancialMetrics,
        Self::LineItems,
        Self::InsiderTrades,
        Self::CompanyNews,
    ];

    /// Field whose value identifies a record within a ticker's bucket
    pub fn identity_field(self) -> &'static str {
        match self {
            Self::Prices => "time",
            Self::FinancialMetrics | Self::LineItems => "report_period",
            Self::InsiderTrades => "filing_date",
            Self::CompanyNews => "date",
        }
    }

    /// Short name for logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prices => "prices",
            Self::FinancialMetrics => "financial_metrics",
            Self::LineItems => "line_items",
            Self::InsiderTrades => "insider_trades",
            Self::CompanyNews => "company_news",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed record stored under a fixed kind
pub trait CacheRecord: Serialize + DeserializeOwned {
    /// Bucket kind for this record type
    const KIND: RecordKind;
}

impl CacheRecord for Price {
    const KIND: RecordKind = RecordKind::Prices;
}

impl CacheRecord for FinancialMetrics {
    const KIND: RecordKind = RecordKind::FinancialMetrics;
}

impl CacheRecord for LineItem {
    const KIND: RecordKind = RecordKind::LineItems;
}

impl CacheRecord for InsiderTrade {
    const KIND: RecordKind = RecordKind::InsiderTrades;
}

impl CacheRecord for CompanyNews {
    const KIND: RecordKind = RecordKind::CompanyNews;
}

/// Identity value of `record` as a hashable key
///
/// # Panics
///
/// Panics when the identity field is missing: every record of a kind must
/// carry it.
fn identity_key(record: &CachedRecord, kind: RecordKind) -> String {
    let field = kind.identity_field();
    match record.get(field) {
        Some(value) => value.to_string(),
        None => panic!("{kind} record is missing its identity field '{field}': {record}"),
    }
}

/// Merge `incoming` into `existing`, keeping existing records on conflict
///
/// The result is `existing` followed by every incoming record whose identity
/// value is new, in incoming order. Repeats within `incoming` keep their first
/// occurrence.
///
/// # Panics
///
/// Panics when any record lacks the kind's identity field.
pub fn merge(
    existing: Vec<CachedRecord>,
    incoming: Vec<CachedRecord>,
    kind: RecordKind,
) -> Vec<CachedRecord> {
    let mut seen: HashSet<String> = existing.iter().map(|r| identity_key(r, kind)).collect();
    let mut merged = existing;
    merged.reserve(incoming.len());

    for record in incoming {
        if seen.insert(identity_key(&record, kind)) {
            merged.push(record);
        }
    }

    merged
}

/// Per-kind, per-ticker record store with identity-based merging
#[derive(Debug, Default)]
pub struct MergeCache {
    buckets: HashMap<RecordKind, HashMap<String, Vec<CachedRecord>>>,
}

impl MergeCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache behind a shared lock
    pub fn shared() -> SharedCache {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Cached records for `ticker`, `None` if nothing was ever stored
    pub fn get(&self, kind: RecordKind, ticker: &str) -> Option<&[CachedRecord]> {
        self.buckets
            .get(&kind)
            .and_then(|tickers| tickers.get(ticker))
            .map(Vec::as_slice)
    }

    /// Merge `records` into the bucket for `ticker`
    ///
    /// # Panics
    ///
    /// Panics when a record lacks the kind's identity field.
    pub fn set(&mut self, kind: RecordKind, ticker: &str, records: Vec<CachedRecord>) {
        let bucket = self
            .buckets
            .entry(kind)
            .or_default()
            .entry(ticker.to_string())
            .or_default();
        let existing = std::mem::take(bucket);
        *bucket = merge(existing, records, kind);
    }

    /// Cached records for `ticker` as typed values
    pub fn get_typed<R: CacheRecord>(&self, ticker: &str) -> Result<Option<Vec<R>>> {
        self.get(R::KIND, ticker)
            .map(|records| {
                records
                    .iter()
                    .map(|r| serde_json::from_value(r.clone()).map_err(Into::into))
                    .collect::<Result<Vec<R>>>()
            })
            .transpose()
    }

    /// Merge typed records into the bucket for `ticker`
    pub fn set_typed<R: CacheRecord>(&mut self, ticker: &str, records: &[R]) -> Result<()> {
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.set(R::KIND, ticker, values);
        Ok(())
    }

    /// Total number of records of `kind` across all tickers
    pub fn len(&self, kind: RecordKind) -> usize {
        self.buckets
            .get(&kind)
            .map_or(0, |tickers| tickers.values().map(Vec::len).sum())
    }

    /// Whether no record of any kind is cached
    pub fn is_empty(&self) -> bool {
        RecordKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str, v: i64) -> CachedRecord {
        json!({"report_period": id, "v": v})
    }

    #[test]
    fn test_absent_key_returns_none() {
        let cache = MergeCache::new();
        assert!(cache.get(RecordKind::Prices, "AAPL").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_merge_duplicate_drop() {
        let merged = merge(
            vec![rec("A", 1)],
            vec![rec("A", 2), rec("B", 3)],
            RecordKind::FinancialMetrics,
        );
        assert_eq!(merged, vec![rec("A", 1), rec("B", 3)]);
    }

    #[test]
    fn test_merge_into_empty_takes_incoming() {
        let incoming = vec![rec("A", 1), rec("B", 2)];
        let merged = merge(Vec::new(), incoming.clone(), RecordKind::LineItems);
        assert_eq!(merged, incoming);
    }

    #[test]
    fn test_merge_collapses_incoming_repeats() {
        let merged = merge(
            Vec::new(),
            vec![rec("A", 1), rec("A", 2)],
            RecordKind::FinancialMetrics,
        );
        assert_eq!(merged, vec![rec("A", 1)]);
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut cache = MergeCache::new();
        let batch = vec![rec("2024-03-31", 1), rec("2023-12-31", 2)];

        cache.set(RecordKind::FinancialMetrics, "AAPL", batch.clone());
        cache.set(RecordKind::FinancialMetrics, "AAPL", batch.clone());

        assert_eq!(
            cache.get(RecordKind::FinancialMetrics, "AAPL"),
            Some(batch.as_slice())
        );
    }

    #[test]
    fn test_set_is_complete() {
        let mut cache = MergeCache::new();
        cache.set(RecordKind::FinancialMetrics, "AAPL", vec![rec("A", 1)]);
        cache.set(
            RecordKind::FinancialMetrics,
            "AAPL",
            vec![rec("B", 2), rec("C", 3)],
        );

        let ids: Vec<&str> = cache
            .get(RecordKind::FinancialMetrics, "AAPL")
            .unwrap()
            .iter()
            .map(|r| r["report_period"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(cache.len(RecordKind::FinancialMetrics), 3);
    }

    #[test]
    fn test_buckets_are_separate() {
        let mut cache = MergeCache::new();
        cache.set(RecordKind::CompanyNews, "AAPL", vec![json!({"date": "2024-01-01"})]);

        assert!(cache.get(RecordKind::CompanyNews, "aapl").is_none());
        assert!(cache.get(RecordKind::InsiderTrades, "AAPL").is_none());
        assert_eq!(cache.len(RecordKind::CompanyNews), 1);
    }

    #[test]
    fn test_null_identity_is_a_value() {
        let mut cache = MergeCache::new();
        cache.set(
            RecordKind::Prices,
            "AAPL",
            vec![json!({"time": null, "close": 1.0}), json!({"time": null, "close": 2.0})],
        );
        assert_eq!(cache.len(RecordKind::Prices), 1);
    }

    #[test]
    #[should_panic(expected = "insider_trades record is missing its identity field 'filing_date'")]
    fn test_missing_identity_panics() {
        let mut cache = MergeCache::new();
        cache.set(RecordKind::InsiderTrades, "AAPL", vec![json!({"ticker": "AAPL"})]);
    }

    #[test]
    fn test_typed_round_trip() {
        let mut cache = MergeCache::new();
        let prices = vec![
            Price {
                open: 1.0,
                close: 2.0,
                high: 2.5,
                low: 0.5,
                volume: 100,
                time: "2024-01-02".to_string(),
            },
            Price {
                open: 2.0,
                close: 3.0,
                high: 3.5,
                low: 1.5,
                volume: 200,
                time: "2024-01-03".to_string(),
            },
        ];

        cache.set_typed("AAPL", &prices).unwrap();
        let cached: Vec<Price> = cache.get_typed("AAPL").unwrap().unwrap();
        assert_eq!(cached, prices);
        assert!(cache.get_typed::<Price>("MSFT").unwrap().is_none());
    }

    #[test]
    fn test_shared_cache() {
        let cache = MergeCache::shared();
        tokio_test::block_on(async {
            cache
                .write()
                .await
                .set(RecordKind::LineItems, "AAPL", vec![rec("2024-09-28", 1)]);
            assert_eq!(cache.read().await.len(RecordKind::LineItems), 1);
        });
    }
}
