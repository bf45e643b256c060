//! Warren Buffett value analyst
//!
//! Scores each ticker on fundamentals, earnings consistency and a discounted
//! owner-earnings valuation, then asks the model for the final call. When the
//! model cannot be reached the ticker still gets a neutral signal with zero
//! confidence.

use crate::context::AnalystContext;
use crate::progress::ProgressTracker;
use agent_core::{AgentState, Analyst, AnalystOutput, AnalystSignal, Error, Result, Signal};
use agent_data::{DEFAULT_PERIOD, DataFetcher, FinancialMetrics, LineItem};
use agent_llm::{CallLabel, ChatTemplate, FieldKind, FieldSpec, LlmInvoker, Schema, StructuredOutput};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

/// Analyst key in state and progress output
pub const AGENT_KEY: &str = "warren_buffett_agent";

/// Reporting periods considered
const HISTORY_PERIODS: usize = 5;

/// Statement items requested for every ticker
const LINE_ITEMS: [&str; 6] = [
    "capital_expenditure",
    "depreciation_and_amortization",
    "net_income",
    "outstanding_shares",
    "total_assets",
    "total_liabilities",
];

/// Points available before any margin-of-safety bonus
const BASE_MAX_SCORE: u32 = 10;

/// Margin of safety that earns the bonus
const MARGIN_OF_SAFETY_THRESHOLD: f64 = 0.3;

/// Share of capital expenditure treated as maintenance spending
const MAINTENANCE_CAPEX_RATIO: f64 = 0.75;

const SYSTEM_TEMPLATE: &str = "You are Warren Buffett's AI assistant. Follow these rules:
1. Only invest in understandable businesses
2. Require >30% margin of safety
3. Look for durable competitive advantages
4. Prefer consistent earnings growth
5. Avoid companies with high debt
6. Long-term investment horizon";

const HUMAN_TEMPLATE: &str = "Analyze this data for {{ ticker }}:
{{ analysis_data }}

Return JSON with:
- signal (bullish/bearish/neutral)
- confidence (0-100)
- reasoning (short explanation)";

/// Final answer expected from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarrenBuffettSignal {
    pub signal: Signal,
    pub confidence: f64,
    pub reasoning: String,
}

impl WarrenBuffettSignal {
    /// Signal recorded when every model attempt failed
    pub fn fallback() -> Self {
        Self {
            signal: Signal::Neutral,
            confidence: 0.0,
            reasoning: "Analysis error".to_string(),
        }
    }
}

impl StructuredOutput for WarrenBuffettSignal {
    fn schema() -> Schema {
        Schema::new(
            "warren_buffett_signal",
            "Investment signal following Warren Buffett's principles",
            vec![
                FieldSpec::new(
                    "signal",
                    "Directional call",
                    FieldKind::Choice(&Signal::ALL),
                ),
                FieldSpec::new("confidence", "Confidence from 0 to 100", FieldKind::Float),
                FieldSpec::new("reasoning", "Short explanation", FieldKind::String),
            ],
        )
    }
}

impl From<WarrenBuffettSignal> for AnalystSignal {
    fn from(output: WarrenBuffettSignal) -> Self {
        Self::new(output.signal, output.confidence, output.reasoning)
    }
}

/// Score from the latest metrics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundamentalAnalysis {
    pub score: u32,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<FinancialMetrics>,
}

/// Score from the net income history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyAnalysis {
    pub score: u32,
    pub details: String,
}

/// Net income plus depreciation minus maintenance capex
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OwnerEarnings {
    pub owner_earnings: f64,
    pub net_income: f64,
    pub depreciation: f64,
    pub maintenance_capex: f64,
}

/// Parameters of the owner-earnings DCF
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DcfAssumptions {
    pub growth_rate: f64,
    pub discount_rate: f64,
    pub terminal_multiple: f64,
    pub projection_years: i32,
}

/// Conservative growth, a 9% hurdle and a 12x exit over ten years
pub const BUFFETT_DCF: DcfAssumptions = DcfAssumptions {
    growth_rate: 0.05,
    discount_rate: 0.09,
    terminal_multiple: 12.0,
    projection_years: 10,
};

/// Result of the DCF valuation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntrinsicValueAnalysis {
    pub intrinsic_value: Option<f64>,
    pub owner_earnings: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assumptions: Option<DcfAssumptions>,
    pub details: Vec<String>,
}

impl IntrinsicValueAnalysis {
    fn unavailable(detail: &str) -> Self {
        Self {
            intrinsic_value: None,
            owner_earnings: None,
            assumptions: None,
            details: vec![detail.to_string()],
        }
    }
}

/// Everything the model sees for one ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuffettAnalysis {
    pub signal: Signal,
    pub score: u32,
    pub max_score: u32,
    pub fundamental_analysis: FundamentalAnalysis,
    pub consistency_analysis: ConsistencyAnalysis,
    pub intrinsic_value_analysis: IntrinsicValueAnalysis,
    pub market_cap: Option<f64>,
    pub margin_of_safety: Option<f64>,
}

impl BuffettAnalysis {
    /// Combine the partial analyses into a score and a preliminary signal
    pub fn combine(
        fundamental_analysis: FundamentalAnalysis,
        consistency_analysis: ConsistencyAnalysis,
        intrinsic_value_analysis: IntrinsicValueAnalysis,
        market_cap: Option<f64>,
    ) -> Self {
        let mut score = fundamental_analysis.score + consistency_analysis.score;
        let mut max_score = BASE_MAX_SCORE;

        let margin_of_safety = match (
            nonzero(intrinsic_value_analysis.intrinsic_value),
            nonzero(market_cap),
        ) {
            (Some(intrinsic), Some(cap)) => Some((intrinsic - cap) / cap),
            _ => None,
        };
        if margin_of_safety.is_some_and(|m| m > MARGIN_OF_SAFETY_THRESHOLD) {
            score += 2;
            max_score += 2;
        }

        Self {
            signal: signal_for_score(score, max_score),
            score,
            max_score,
            fundamental_analysis,
            consistency_analysis,
            intrinsic_value_analysis,
            market_cap,
            margin_of_safety,
        }
    }
}

/// Bullish from 70% of the available points, bearish at 30% or below
pub fn signal_for_score(score: u32, max_score: u32) -> Signal {
    let score = f64::from(score);
    let max_score = f64::from(max_score);
    if score >= 0.7 * max_score {
        Signal::Bullish
    } else if score <= 0.3 * max_score {
        Signal::Bearish
    } else {
        Signal::Neutral
    }
}

/// Zero counts as missing data
fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Score ROE, leverage, operating margin and liquidity of the newest snapshot
pub fn analyze_fundamentals(metrics: &[FinancialMetrics]) -> FundamentalAnalysis {
    let Some(latest) = metrics.first() else {
        return FundamentalAnalysis {
            score: 0,
            details: "Insufficient fundamental data".to_string(),
            metrics: None,
        };
    };

    let mut score = 0;
    let mut reasoning = Vec::new();

    match nonzero(latest.return_on_equity) {
        Some(roe) if roe > 0.15 => {
            score += 2;
            reasoning.push(format!("Strong ROE of {}", percent(roe)));
        }
        Some(roe) => reasoning.push(format!("Weak ROE of {}", percent(roe))),
        None => reasoning.push("ROE data not available".to_string()),
    }

    match nonzero(latest.debt_to_equity) {
        Some(de) if de < 0.5 => {
            score += 2;
            reasoning.push("Conservative debt levels".to_string());
        }
        Some(de) => reasoning.push(format!("High debt to equity ratio of {de:.1}")),
        None => reasoning.push("Debt to equity data not available".to_string()),
    }

    match nonzero(latest.operating_margin) {
        Some(margin) if margin > 0.15 => {
            score += 2;
            reasoning.push("Strong operating margins".to_string());
        }
        Some(margin) => reasoning.push(format!("Weak operating margin of {}", percent(margin))),
        None => reasoning.push("Operating margin data not available".to_string()),
    }

    match nonzero(latest.current_ratio) {
        Some(ratio) if ratio > 1.5 => {
            score += 1;
            reasoning.push("Good liquidity position".to_string());
        }
        Some(ratio) => {
            reasoning.push(format!("Weak liquidity with current ratio of {ratio:.1}"));
        }
        None => reasoning.push("Current ratio data not available".to_string()),
    }

    FundamentalAnalysis {
        score,
        details: reasoning.join("; "),
        metrics: Some(latest.clone()),
    }
}

/// Score the net income history, newest period first
pub fn analyze_consistency(line_items: &[LineItem]) -> ConsistencyAnalysis {
    if line_items.len() < 4 {
        return ConsistencyAnalysis {
            score: 0,
            details: "Insufficient historical data".to_string(),
        };
    }

    let earnings: Vec<f64> = line_items
        .iter()
        .filter_map(|item| nonzero(item.get_f64("net_income")))
        .collect();

    let mut score = 0;
    let mut reasoning = Vec::new();

    if let [newest, _, _, .., oldest] = earnings.as_slice() {
        if earnings.windows(2).all(|pair| pair[0] > pair[1]) {
            score += 3;
            reasoning.push("Consistent earnings growth over past periods".to_string());
        } else {
            reasoning.push("Inconsistent earnings growth pattern".to_string());
        }

        let growth_rate = (newest - oldest) / oldest.abs();
        reasoning.push(format!(
            "Total earnings growth of {} over past periods",
            percent(growth_rate)
        ));
    }

    ConsistencyAnalysis {
        score,
        details: reasoning.join("; "),
    }
}

/// Owner earnings of the newest period
///
/// Fails with a short reason when the period is missing or any component is
/// absent or zero.
pub fn calculate_owner_earnings(
    line_items: &[LineItem],
) -> std::result::Result<OwnerEarnings, &'static str> {
    let latest = line_items.first().ok_or("Insufficient data")?;

    let components = (
        nonzero(latest.get_f64("net_income")),
        nonzero(latest.get_f64("depreciation_and_amortization")),
        nonzero(latest.get_f64("capital_expenditure")),
    );
    let (Some(net_income), Some(depreciation), Some(capex)) = components else {
        return Err("Missing data components");
    };

    let maintenance_capex = capex * MAINTENANCE_CAPEX_RATIO;
    Ok(OwnerEarnings {
        owner_earnings: net_income + depreciation - maintenance_capex,
        net_income,
        depreciation,
        maintenance_capex,
    })
}

/// Present value of projected owner earnings plus a terminal multiple
pub fn discounted_value(owner_earnings: f64, assumptions: &DcfAssumptions) -> f64 {
    let growth = 1.0 + assumptions.growth_rate;
    let discount = 1.0 + assumptions.discount_rate;
    let years = assumptions.projection_years;

    let projected: f64 = (1..=years)
        .map(|year| owner_earnings * growth.powi(year) / discount.powi(year))
        .sum();
    let terminal =
        owner_earnings * growth.powi(years) * assumptions.terminal_multiple / discount.powi(years);

    projected + terminal
}

/// Intrinsic value of the whole company from owner earnings
pub fn calculate_intrinsic_value(line_items: &[LineItem]) -> IntrinsicValueAnalysis {
    if line_items.is_empty() {
        return IntrinsicValueAnalysis::unavailable("Insufficient data for valuation");
    }

    let earnings = match calculate_owner_earnings(line_items) {
        Ok(earnings) if earnings.owner_earnings != 0.0 => earnings,
        Ok(_) => return IntrinsicValueAnalysis::unavailable("Owner earnings are zero"),
        Err(reason) => return IntrinsicValueAnalysis::unavailable(reason),
    };

    if nonzero(line_items[0].get_f64("outstanding_shares")).is_none() {
        return IntrinsicValueAnalysis {
            owner_earnings: Some(earnings.owner_earnings),
            ..IntrinsicValueAnalysis::unavailable("Missing shares data")
        };
    }

    IntrinsicValueAnalysis {
        intrinsic_value: Some(discounted_value(earnings.owner_earnings, &BUFFETT_DCF)),
        owner_earnings: Some(earnings.owner_earnings),
        assumptions: Some(BUFFETT_DCF),
        details: vec!["Intrinsic value calculated using DCF model".to_string()],
    }
}

/// Value analyst in the style of Warren Buffett
pub struct WarrenBuffettAnalyst {
    fetcher: DataFetcher,
    invoker: Arc<LlmInvoker>,
    progress: Arc<ProgressTracker>,
    template: ChatTemplate,
}

impl WarrenBuffettAnalyst {
    /// Create the analyst over shared run services
    pub fn new(context: &AnalystContext) -> Result<Self> {
        let template = ChatTemplate::new(AGENT_KEY, SYSTEM_TEMPLATE, HUMAN_TEMPLATE)
            .map_err(|e| Error::InitializationFailed(e.to_string()))?;

        Ok(Self {
            fetcher: context.fetcher.clone(),
            invoker: Arc::clone(&context.invoker),
            progress: Arc::clone(&context.progress),
            template,
        })
    }

    fn status(&self, ticker: &str, status: &str) {
        self.progress.update_status(AGENT_KEY, Some(ticker), status);
    }

    /// Fetch data and compute the deterministic part of the analysis
    pub async fn score_ticker(&self, ticker: &str, end: NaiveDate) -> Result<BuffettAnalysis> {
        self.status(ticker, "Fetching financial metrics");
        let metrics = self
            .fetcher
            .get_financial_metrics(ticker, end, DEFAULT_PERIOD, HISTORY_PERIODS)
            .await?;

        self.status(ticker, "Gathering financial line items");
        let line_items: Vec<String> = LINE_ITEMS.iter().map(ToString::to_string).collect();
        let financial_line_items = self
            .fetcher
            .search_line_items(ticker, &line_items, end, DEFAULT_PERIOD, HISTORY_PERIODS)
            .await?;

        self.status(ticker, "Getting market cap");
        let market_cap = self.fetcher.get_market_cap(ticker, end).await?;

        self.status(ticker, "Analyzing fundamentals");
        let fundamental = analyze_fundamentals(&metrics);

        self.status(ticker, "Analyzing consistency");
        let consistency = analyze_consistency(&financial_line_items);

        self.status(ticker, "Calculating intrinsic value");
        let intrinsic = calculate_intrinsic_value(&financial_line_items);

        Ok(BuffettAnalysis::combine(
            fundamental,
            consistency,
            intrinsic,
            market_cap,
        ))
    }

    /// Ask the model for the final signal
    pub async fn generate_output(
        &self,
        ticker: &str,
        analysis: &BuffettAnalysis,
    ) -> Result<WarrenBuffettSignal> {
        let analysis_data = serde_json::to_string_pretty(analysis)
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;
        let prompt = self
            .template
            .render(&json!({ "ticker": ticker, "analysis_data": analysis_data }))
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

        let label = CallLabel::for_ticker(AGENT_KEY, ticker);
        Ok(self
            .invoker
            .invoke_or(&prompt, &label, WarrenBuffettSignal::fallback)
            .await)
    }
}

#[async_trait]
impl Analyst for WarrenBuffettAnalyst {
    #[instrument(skip(self, state), fields(tickers = state.tickers.len()))]
    async fn analyze(&self, state: &AgentState) -> Result<AnalystOutput> {
        let mut output = AnalystOutput::new();

        for ticker in &state.tickers {
            let analysis = self.score_ticker(ticker, state.end_date).await?;
            info!(
                ticker = %ticker,
                score = analysis.score,
                max_score = analysis.max_score,
                signal = %analysis.signal,
                "Scored ticker"
            );

            self.status(ticker, "Generating Buffett analysis");
            let signal = self.generate_output(ticker, &analysis).await?;
            output.insert(ticker.clone(), signal.into());

            self.status(ticker, "Done");
        }

        Ok(output)
    }

    fn key(&self) -> &str {
        AGENT_KEY
    }

    fn display_name(&self) -> &str {
        "Warren Buffett"
    }
}

impl std::fmt::Debug for WarrenBuffettAnalyst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarrenBuffettAnalyst")
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}
