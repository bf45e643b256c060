//! Analyst registry
//!
//! Single source of truth for which analysts exist, how they are shown and in
//! which order they run.

use crate::context::AnalystContext;
use crate::warren_buffett::WarrenBuffettAnalyst;
use agent_core::{Analyst, Error, Result};
use std::sync::Arc;

type Factory = fn(&AnalystContext) -> Result<Arc<dyn Analyst>>;

/// Registry entry for one analyst
#[derive(Debug, Clone, Copy)]
pub struct AnalystEntry {
    /// Selection key (e.g. `warren_buffett`)
    pub key: &'static str,
    /// Human-readable name
    pub display_name: &'static str,
    /// Run and display order, lower first
    pub order: u32,
    factory: Factory,
}

impl AnalystEntry {
    /// Key the analyst's signals are stored under
    pub fn node_name(&self) -> String {
        format!("{}_agent", self.key)
    }

    /// Instantiate the analyst
    pub fn build(&self, context: &AnalystContext) -> Result<Arc<dyn Analyst>> {
        (self.factory)(context)
    }
}

fn warren_buffett(context: &AnalystContext) -> Result<Arc<dyn Analyst>> {
    Ok(Arc::new(WarrenBuffettAnalyst::new(context)?))
}

const ANALYSTS: &[AnalystEntry] = &[AnalystEntry {
    key: "warren_buffett",
    display_name: "Warren Buffett",
    order: 5,
    factory: warren_buffett,
}];

/// Every registered analyst, in run order
pub fn analyst_order() -> Vec<AnalystEntry> {
    let mut entries = ANALYSTS.to_vec();
    entries.sort_by_key(|entry| entry.order);
    entries
}

/// Look up an analyst by key
pub fn find_analyst(key: &str) -> Option<AnalystEntry> {
    ANALYSTS.iter().find(|entry| entry.key == key).copied()
}

/// Instantiate the selected analysts in run order
///
/// An empty selection means every registered analyst.
pub fn build_analysts(keys: &[String], context: &AnalystContext) -> Result<Vec<Arc<dyn Analyst>>> {
    let mut selected = if keys.is_empty() {
        analyst_order()
    } else {
        keys.iter()
            .map(|key| find_analyst(key).ok_or_else(|| Error::UnknownAnalyst(key.clone())))
            .collect::<Result<Vec<_>>>()?
    };
    selected.sort_by_key(|entry| entry.order);
    selected.dedup_by_key(|entry| entry.key);

    selected.iter().map(|entry| entry.build(context)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use agent_data::{DataError, DataSource};
    use agent_llm::{CompletionRequest, CompletionResponse, LLMError, LLMProvider};
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl LLMProvider for Offline {
        async fn complete(&self, _request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
            Err(LLMError::RequestFailed("offline".to_string()))
        }

        fn name(&self) -> &str {
            "offline"
        }
    }

    struct NoData;

    #[async_trait]
    impl DataSource for NoData {
        async fn fetch_prices(
            &self,
            ticker: &str,
            _start: chrono::NaiveDate,
            _end: chrono::NaiveDate,
        ) -> agent_data::Result<Vec<agent_data::Price>> {
            Err(DataError::Config(format!("no data for {ticker}")))
        }

        async fn fetch_financial_metrics(
            &self,
            _ticker: &str,
            _end: chrono::NaiveDate,
            _period: &str,
            _limit: usize,
        ) -> agent_data::Result<Vec<agent_data::FinancialMetrics>> {
            Ok(Vec::new())
        }

        async fn search_line_items(
            &self,
            _ticker: &str,
            _line_items: &[String],
            _end: chrono::NaiveDate,
            _period: &str,
            _limit: usize,
        ) -> agent_data::Result<Vec<agent_data::LineItem>> {
            Ok(Vec::new())
        }

        async fn fetch_insider_trades(
            &self,
            _ticker: &str,
            _end: chrono::NaiveDate,
            _start: Option<chrono::NaiveDate>,
            _limit: usize,
        ) -> agent_data::Result<Vec<agent_data::InsiderTrade>> {
            Ok(Vec::new())
        }

        async fn fetch_company_news(
            &self,
            _ticker: &str,
            _end: chrono::NaiveDate,
            _start: Option<chrono::NaiveDate>,
            _limit: usize,
        ) -> agent_data::Result<Vec<agent_data::CompanyNews>> {
            Ok(Vec::new())
        }
    }

    fn context() -> AnalystContext {
        AnalystContext::with_backends(&AnalysisConfig::default(), Arc::new(Offline), Arc::new(NoData))
            .unwrap()
    }

    #[test]
    fn test_registry_entries() {
        let entry = find_analyst("warren_buffett").unwrap();
        assert_eq!(entry.display_name, "Warren Buffett");
        assert_eq!(entry.node_name(), "warren_buffett_agent");
        assert!(find_analyst("warren").is_none());
        assert!(analyst_order().windows(2).all(|w| w[0].order <= w[1].order));
    }

    #[test]
    fn test_build_all_by_default() {
        let analysts = build_analysts(&[], &context()).unwrap();
        assert_eq!(analysts.len(), analyst_order().len());
        assert_eq!(analysts[0].key(), "warren_buffett_agent");
    }

    #[test]
    fn test_build_rejects_unknown_key() {
        let keys = vec!["warren_buffett".to_string(), "george_soros".to_string()];
        let result = build_analysts(&keys, &context());
        assert!(matches!(result, Err(Error::UnknownAnalyst(key)) if key == "george_soros"));
    }

    #[test]
    fn test_build_deduplicates() {
        let keys = vec!["warren_buffett".to_string(), "warren_buffett".to_string()];
        assert_eq!(build_analysts(&keys, &context()).unwrap().len(), 1);
    }
}
