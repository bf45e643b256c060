//! Cache-consulting data access
//!
//! Every getter first looks in the shared [`MergeCache`](crate::MergeCache).
//! A non-empty filtered hit is returned without touching the source;
//! otherwise the source is queried, the result merged into the cache, and
//! the fresh records returned. Empty results are never cached.

use crate::cache::{CacheRecord, SharedCache};
use crate::error::Result;
use crate::models::{CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price, date_part};
use crate::source::DataSource;
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Default reporting period for metrics and line items
pub const DEFAULT_PERIOD: &str = "ttm";
/// Default number of reporting periods
pub const DEFAULT_PERIOD_LIMIT: usize = 10;
/// Default page size for insider trades and news
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Market data access through a shared merge cache
#[derive(Clone)]
pub struct DataFetcher {
    source: Arc<dyn DataSource>,
    cache: SharedCache,
}

impl DataFetcher {
    /// Create a fetcher over `source` backed by `cache`
    pub fn new(source: Arc<dyn DataSource>, cache: SharedCache) -> Self {
        Self { source, cache }
    }

    /// The shared cache
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    async fn cached<R: CacheRecord>(&self, ticker: &str) -> Result<Option<Vec<R>>> {
        self.cache.read().await.get_typed::<R>(ticker)
    }

    async fn store<R: CacheRecord>(&self, ticker: &str, records: &[R]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.cache.write().await.set_typed(ticker, records)
    }

    /// Daily prices between `start` and `end`, inclusive
    #[instrument(skip(self))]
    pub async fn get_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Price>> {
        let (from, to) = (iso(start), iso(end));

        if let Some(cached) = self.cached::<Price>(ticker).await? {
            let hits: Vec<Price> = cached
                .into_iter()
                .filter(|p| in_range(&p.time, Some(from.as_str()), &to))
                .collect();
            if !hits.is_empty() {
                debug!("Cache hit: {} prices", hits.len());
                return Ok(hits);
            }
        }

        debug!("Cache miss for prices");
        let prices = self.source.fetch_prices(ticker, start, end).await?;
        self.store(ticker, &prices).await?;
        Ok(prices)
    }

    /// Metric snapshots reported on or before `end`, newest first
    #[instrument(skip(self))]
    pub async fn get_financial_metrics(
        &self,
        ticker: &str,
        end: NaiveDate,
        period: &str,
        limit: usize,
    ) -> Result<Vec<FinancialMetrics>> {
        let to = iso(end);

        if let Some(cached) = self.cached::<FinancialMetrics>(ticker).await? {
            let mut hits: Vec<FinancialMetrics> = cached
                .into_iter()
                .filter(|m| m.period == period && date_part(&m.report_period) <= to.as_str())
                .collect();
            if !hits.is_empty() {
                hits.sort_by(|a, b| b.report_period.cmp(&a.report_period));
                hits.truncate(limit);
                debug!("Cache hit: {} metric snapshots", hits.len());
                return Ok(hits);
            }
        }

        debug!("Cache miss for financial metrics");
        let metrics = self
            .source
            .fetch_financial_metrics(ticker, end, period, limit)
            .await?;
        self.store(ticker, &metrics).await?;
        Ok(metrics)
    }

    /// Statement items for up to `limit` periods on or before `end`, newest first
    ///
    /// Cached periods are only used when they carry every requested item.
    #[instrument(skip(self, line_items), fields(items = ?line_items))]
    pub async fn search_line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        end: NaiveDate,
        period: &str,
        limit: usize,
    ) -> Result<Vec<LineItem>> {
        let to = iso(end);

        if let Some(cached) = self.cached::<LineItem>(ticker).await? {
            let mut hits: Vec<LineItem> = cached
                .into_iter()
                .filter(|item| {
                    item.period == period
                        && date_part(&item.report_period) <= to.as_str()
                        && line_items.iter().all(|name| item.has(name))
                })
                .collect();
            if !hits.is_empty() {
                hits.sort_by(|a, b| b.report_period.cmp(&a.report_period));
                hits.truncate(limit);
                debug!("Cache hit: {} line item periods", hits.len());
                return Ok(hits);
            }
        }

        debug!("Cache miss for line items");
        let mut items = self
            .source
            .search_line_items(ticker, line_items, end, period, limit)
            .await?;
        items.truncate(limit);
        self.store(ticker, &items).await?;
        Ok(items)
    }

    /// Insider trades in `[start, end]`, newest first when served from cache
    #[instrument(skip(self))]
    pub async fn get_insider_trades(
        &self,
        ticker: &str,
        end: NaiveDate,
        start: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<InsiderTrade>> {
        let (from, to) = (start.map(iso), iso(end));

        if let Some(cached) = self.cached::<InsiderTrade>(ticker).await? {
            let mut hits: Vec<InsiderTrade> = cached
                .into_iter()
                .filter(|t| in_range(t.effective_date(), from.as_deref(), &to))
                .collect();
            if !hits.is_empty() {
                hits.sort_by(|a, b| b.effective_date().cmp(a.effective_date()));
                debug!("Cache hit: {} insider trades", hits.len());
                return Ok(hits);
            }
        }

        debug!("Cache miss for insider trades");
        let source = &self.source;
        let trades = paginate(
            end,
            start,
            limit,
            move |page_end| source.fetch_insider_trades(ticker, page_end, start, limit),
            trade_filing_date,
        )
        .await?;
        self.store(ticker, &trades).await?;
        Ok(trades)
    }

    /// News in `[start, end]`, newest first when served from cache
    #[instrument(skip(self))]
    pub async fn get_company_news(
        &self,
        ticker: &str,
        end: NaiveDate,
        start: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<CompanyNews>> {
        let (from, to) = (start.map(iso), iso(end));

        if let Some(cached) = self.cached::<CompanyNews>(ticker).await? {
            let mut hits: Vec<CompanyNews> = cached
                .into_iter()
                .filter(|n| in_range(&n.date, from.as_deref(), &to))
                .collect();
            if !hits.is_empty() {
                hits.sort_by(|a, b| b.date.cmp(&a.date));
                debug!("Cache hit: {} news articles", hits.len());
                return Ok(hits);
            }
        }

        debug!("Cache miss for company news");
        let source = &self.source;
        let news = paginate(
            end,
            start,
            limit,
            move |page_end| source.fetch_company_news(ticker, page_end, start, limit),
            news_date,
        )
        .await?;
        self.store(ticker, &news).await?;
        Ok(news)
    }

    /// Market cap from the newest TTM metrics snapshot
    ///
    /// `None` when there is no snapshot or the value is missing or zero.
    pub async fn get_market_cap(&self, ticker: &str, end: NaiveDate) -> Result<Option<f64>> {
        let metrics = self
            .get_financial_metrics(ticker, end, DEFAULT_PERIOD, DEFAULT_PERIOD_LIMIT)
            .await?;
        Ok(metrics
            .first()
            .and_then(|m| m.market_cap)
            .filter(|cap| *cap != 0.0))
    }
}

impl std::fmt::Debug for DataFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFetcher").finish_non_exhaustive()
    }
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn trade_filing_date(trade: &InsiderTrade) -> &str {
    &trade.filing_date
}

fn news_date(news: &CompanyNews) -> &str {
    &news.date
}

fn in_range(timestamp: &str, from: Option<&str>, to: &str) -> bool {
    let day = date_part(timestamp);
    from.is_none_or(|from| day >= from) && day <= to
}

/// Walk pages backwards in time from `end`
///
/// Stops when a page is empty, when there is no `start`, when a page is
/// short, or when the oldest record of a page is on or before `start`. The
/// next page ends at the oldest date seen.
async fn paginate<R, F, Fut>(
    end: NaiveDate,
    start: Option<NaiveDate>,
    limit: usize,
    mut fetch_page: F,
    date_of: fn(&R) -> &str,
) -> Result<Vec<R>>
where
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<Vec<R>>>,
{
    let mut all = Vec::new();
    let mut current_end = end;

    loop {
        let page = fetch_page(current_end).await?;
        if page.is_empty() {
            break;
        }

        let page_len = page.len();
        let oldest = page
            .iter()
            .map(|r| date_part(date_of(r)))
            .min()
            .map(str::to_string);
        all.extend(page);

        let Some(start) = start else { break };
        if page_len < limit {
            break;
        }

        let Some(oldest) = oldest.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
        else {
            warn!("Unparseable page date, stopping pagination");
            break;
        };
        // A full page from a single day cannot move the window
        if oldest <= start || oldest >= current_end {
            break;
        }
        current_end = oldest;
    }

    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MergeCache, RecordKind};
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Source {}

        #[async_trait]
        impl DataSource for Source {
            async fn fetch_prices(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
                -> Result<Vec<Price>>;
            async fn fetch_financial_metrics(
                &self,
                ticker: &str,
                end: NaiveDate,
                period: &str,
                limit: usize,
            ) -> Result<Vec<FinancialMetrics>>;
            async fn search_line_items(
                &self,
                ticker: &str,
                line_items: &[String],
                end: NaiveDate,
                period: &str,
                limit: usize,
            ) -> Result<Vec<LineItem>>;
            async fn fetch_insider_trades(
                &self,
                ticker: &str,
                end: NaiveDate,
                start: Option<NaiveDate>,
                limit: usize,
            ) -> Result<Vec<InsiderTrade>>;
            async fn fetch_company_news(
                &self,
                ticker: &str,
                end: NaiveDate,
                start: Option<NaiveDate>,
                limit: usize,
            ) -> Result<Vec<CompanyNews>>;
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn price(time: &str, close: f64) -> Price {
        Price {
            open: close,
            close,
            high: close,
            low: close,
            volume: 1_000,
            time: time.to_string(),
        }
    }

    fn metrics(report_period: &str, market_cap: Option<f64>) -> FinancialMetrics {
        FinancialMetrics {
            ticker: "AAPL".to_string(),
            report_period: report_period.to_string(),
            period: "ttm".to_string(),
            currency: "USD".to_string(),
            market_cap,
            ..Default::default()
        }
    }

    fn trade(filing_date: &str) -> InsiderTrade {
        InsiderTrade {
            ticker: "AAPL".to_string(),
            filing_date: filing_date.to_string(),
            ..Default::default()
        }
    }

    fn fetcher_over(source: MockSource) -> DataFetcher {
        DataFetcher::new(Arc::new(source), MergeCache::shared())
    }

    #[tokio::test]
    async fn test_prices_served_from_cache_on_hit() {
        let mut source = MockSource::new();
        source
            .expect_fetch_prices()
            .times(1)
            .returning(|_, _, _| Ok(vec![price("2024-01-02", 1.0), price("2024-01-03", 2.0)]));
        let fetcher = fetcher_over(source);

        let first = fetcher
            .get_prices("AAPL", day("2024-01-01"), day("2024-01-31"))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        // Second call must not reach the source (times(1) above)
        let second = fetcher
            .get_prices("AAPL", day("2024-01-03"), day("2024-01-31"))
            .await
            .unwrap();
        assert_eq!(second, vec![price("2024-01-03", 2.0)]);
    }

    #[tokio::test]
    async fn test_prices_refetch_when_cache_misses_range() {
        let mut source = MockSource::new();
        source
            .expect_fetch_prices()
            .times(2)
            .returning(|_, start, _| Ok(vec![price(&iso(start), 1.0)]));
        let fetcher = fetcher_over(source);

        fetcher
            .get_prices("AAPL", day("2024-01-02"), day("2024-01-02"))
            .await
            .unwrap();
        fetcher
            .get_prices("AAPL", day("2024-02-01"), day("2024-02-01"))
            .await
            .unwrap();

        assert_eq!(fetcher.cache().read().await.len(RecordKind::Prices), 2);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_cached() {
        let mut source = MockSource::new();
        source
            .expect_fetch_prices()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        let fetcher = fetcher_over(source);

        let prices = fetcher
            .get_prices("AAPL", day("2024-01-01"), day("2024-01-31"))
            .await
            .unwrap();
        assert!(prices.is_empty());
        assert!(fetcher.cache().read().await.get(RecordKind::Prices, "AAPL").is_none());
    }

    #[tokio::test]
    async fn test_metrics_newest_first_and_limited() {
        let mut source = MockSource::new();
        source
            .expect_fetch_financial_metrics()
            .with(eq("AAPL"), eq(day("2024-12-31")), eq("ttm"), eq(10))
            .times(1)
            .returning(|_, _, _, _| {
                Ok(vec![
                    metrics("2023-12-31", Some(2.0)),
                    metrics("2024-06-30", Some(3.0)),
                    metrics("2024-12-31", Some(4.0)),
                ])
            });
        let fetcher = fetcher_over(source);

        fetcher
            .get_financial_metrics("AAPL", day("2024-12-31"), "ttm", 10)
            .await
            .unwrap();
        let cached = fetcher
            .get_financial_metrics("AAPL", day("2024-07-01"), "ttm", 1)
            .await
            .unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].report_period, "2024-06-30");
    }

    #[tokio::test]
    async fn test_market_cap() {
        let mut source = MockSource::new();
        source
            .expect_fetch_financial_metrics()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![metrics("2024-12-31", Some(0.0))]));
        let fetcher = fetcher_over(source);
        assert_eq!(
            fetcher.get_market_cap("AAPL", day("2024-12-31")).await.unwrap(),
            None
        );

        let mut source = MockSource::new();
        source
            .expect_fetch_financial_metrics()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![metrics("2024-12-31", Some(3.4e12))]));
        let fetcher = fetcher_over(source);
        assert_eq!(
            fetcher.get_market_cap("AAPL", day("2024-12-31")).await.unwrap(),
            Some(3.4e12)
        );
    }

    #[tokio::test]
    async fn test_line_items_need_every_requested_item() {
        let mut source = MockSource::new();
        source
            .expect_search_line_items()
            .times(2)
            .returning(|_, names, _, _, _| {
                let mut item = LineItem {
                    ticker: "AAPL".to_string(),
                    report_period: "2024-09-28".to_string(),
                    period: "ttm".to_string(),
                    currency: "USD".to_string(),
                    ..Default::default()
                };
                for name in names {
                    item = item.with(name.clone(), 1.0);
                }
                Ok(vec![item])
            });
        let fetcher = fetcher_over(source);
        let end = day("2024-12-31");

        let net_income = vec!["net_income".to_string()];
        fetcher
            .search_line_items("AAPL", &net_income, end, "ttm", 10)
            .await
            .unwrap();
        // Cached period lacks "revenue", so this one goes to the source
        let both = vec!["net_income".to_string(), "revenue".to_string()];
        let items = fetcher
            .search_line_items("AAPL", &both, end, "ttm", 10)
            .await
            .unwrap();
        assert_eq!(items[0].get_f64("revenue"), Some(1.0));

        // Old record wins on merge, so the cache still lacks "revenue"
        let cached = fetcher.cache().read().await.get_typed::<LineItem>("AAPL").unwrap().unwrap();
        assert!(!cached[0].has("revenue"));
    }

    #[tokio::test]
    async fn test_insider_pagination_walks_back_to_start() {
        let mut source = MockSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_fetch_insider_trades()
            .with(eq("AAPL"), eq(day("2024-03-31")), eq(Some(day("2024-01-01"))), eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(vec![trade("2024-03-15"), trade("2024-02-10T12:00:00")]));
        source
            .expect_fetch_insider_trades()
            .with(eq("AAPL"), eq(day("2024-02-10")), eq(Some(day("2024-01-01"))), eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(vec![trade("2024-01-20"), trade("2023-12-30")]));
        let fetcher = fetcher_over(source);

        let trades = fetcher
            .get_insider_trades("AAPL", day("2024-03-31"), Some(day("2024-01-01")), 2)
            .await
            .unwrap();
        assert_eq!(trades.len(), 4);
    }

    #[tokio::test]
    async fn test_insider_pagination_stops_without_start() {
        let mut source = MockSource::new();
        source
            .expect_fetch_insider_trades()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![trade("2024-03-15"), trade("2024-02-10")]));
        let fetcher = fetcher_over(source);

        let trades = fetcher
            .get_insider_trades("AAPL", day("2024-03-31"), None, 2)
            .await
            .unwrap();
        assert_eq!(trades.len(), 2);
    }

    #[tokio::test]
    async fn test_insider_pagination_stops_on_short_page() {
        let mut source = MockSource::new();
        source
            .expect_fetch_insider_trades()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![trade("2024-03-15")]));
        let fetcher = fetcher_over(source);

        let trades = fetcher
            .get_insider_trades("AAPL", day("2024-03-31"), Some(day("2024-01-01")), 5)
            .await
            .unwrap();
        assert_eq!(trades.len(), 1);
    }

    #[tokio::test]
    async fn test_news_pagination_stops_on_empty_page() {
        let mut source = MockSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_fetch_company_news()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| {
                Ok(vec![CompanyNews {
                    ticker: "AAPL".to_string(),
                    date: "2024-03-01".to_string(),
                    ..Default::default()
                }])
            });
        source
            .expect_fetch_company_news()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(Vec::new()));
        let fetcher = fetcher_over(source);

        let news = fetcher
            .get_company_news("AAPL", day("2024-03-31"), Some(day("2024-01-01")), 1)
            .await
            .unwrap();
        assert_eq!(news.len(), 1);

        let cached = fetcher
            .get_company_news("AAPL", day("2024-03-31"), Some(day("2024-02-01")), 1)
            .await
            .unwrap();
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_trades_filter_on_transaction_date() {
        let cache = MergeCache::shared();
        cache
            .write()
            .await
            .set_typed(
                "AAPL",
                &[
                    InsiderTrade {
                        transaction_date: Some("2024-01-05".to_string()),
                        ..trade("2024-02-01")
                    },
                    trade("2024-03-01"),
                ],
            )
            .unwrap();
        let fetcher = DataFetcher::new(Arc::new(MockSource::new()), cache);

        let trades = fetcher
            .get_insider_trades("AAPL", day("2024-01-31"), Some(day("2024-01-01")), 10)
            .await
            .unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].filing_date, "2024-02-01");
    }

    #[tokio::test]
    async fn test_source_error_propagates() {
        let mut source = MockSource::new();
        source.expect_fetch_prices().returning(|ticker, _, _| {
            Err(crate::DataError::Api {
                ticker: ticker.to_string(),
                status: 401,
                body: "bad key".to_string(),
            })
        });
        let fetcher = fetcher_over(source);

        let err = fetcher
            .get_prices("AAPL", day("2024-01-01"), day("2024-01-31"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::DataError::Api { status: 401, .. }));
    }
}
