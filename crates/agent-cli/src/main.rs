//! Command-line interface for the analyst pipeline
//!
//! # Usage
//!
//! ```bash
//! # API keys are read from the environment or a .env file
//! export OPENAI_API_KEY="sk-..."
//! export FINANCIAL_DATASETS_API_KEY="..."
//!
//! cargo run -p agent-cli -- --tickers AAPL,MSFT --show-reasoning
//! ```

use agent_analysts::{
    AnalysisConfig, AnalysisRunner, AnalystContext, analyst_order, build_analysts, display_label,
};
use agent_core::AgentState;
use agent_llm::{ModelProvider, available_models};
use anyhow::{Context, bail};
use chrono::{Local, Months, NaiveDate};
use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "agent-cli")]
#[command(about = "Run investor-style analysts over a list of tickers", long_about = None)]
struct Args {
    /// Comma-separated ticker symbols (e.g. AAPL,MSFT,NVDA)
    #[arg(long, value_delimiter = ',', required_unless_present = "list_models")]
    tickers: Vec<String>,

    /// Start of the analysis window (YYYY-MM-DD), defaults to three months before the end
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// End of the analysis window (YYYY-MM-DD), defaults to today
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Comma-separated analyst keys, defaults to all
    #[arg(long, value_delimiter = ',')]
    analysts: Vec<String>,

    /// Model name
    #[arg(long, default_value = agent_analysts::DEFAULT_MODEL)]
    model: String,

    /// Model provider, required for models outside the catalog
    #[arg(long)]
    provider: Option<ModelProvider>,

    /// Attempts per model call
    #[arg(long, default_value_t = agent_llm::retry::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Print each analyst's reasoning as JSON
    #[arg(long)]
    show_reasoning: bool,

    /// List available models and analysts, then exit
    #[arg(long)]
    list_models: bool,
}

fn normalize_tickers(raw: &[String]) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for ticker in raw {
        let ticker = ticker.trim().to_uppercase();
        if !ticker.is_empty() && !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

fn resolve_dates(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let end = end.unwrap_or(today);
    let start = match start {
        Some(start) => start,
        None => end
            .checked_sub_months(Months::new(3))
            .context("end date is too early")?,
    };

    if start > end {
        bail!("start date {start} is after end date {end}");
    }
    Ok((start, end))
}

fn models_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Model", "Name", "Provider", "Output"]);
    for model in available_models() {
        table.add_row(vec![
            Cell::new(&model.display_name),
            Cell::new(&model.model_name),
            Cell::new(model.provider),
            Cell::new(format!("{:?}", model.response_mode())),
        ]);
    }
    table
}

fn analysts_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Key", "Analyst"]);
    for entry in analyst_order() {
        table.add_row(vec![entry.key, entry.display_name]);
    }
    table
}

fn signals_table(state: &AgentState) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Ticker", "Analyst", "Signal", "Confidence", "Reasoning"]);

    for analysis in state.ticker_analyses() {
        for (analyst, signal) in &analysis.analyst_signals {
            table.add_row(vec![
                Cell::new(&analysis.ticker),
                Cell::new(display_label(analyst)),
                Cell::new(signal.signal.map_or("-", |s| s.as_str())),
                Cell::new(
                    signal
                        .confidence
                        .map_or_else(|| "-".to_string(), |c| format!("{c:.1}%")),
                ),
                Cell::new(signal.reasoning_text()),
            ]);
        }
    }
    table
}

fn print_reasoning(state: &AgentState) -> anyhow::Result<()> {
    for (analyst, signals) in &state.analyst_signals {
        println!("==== {} ====", display_label(analyst));
        println!("{}", serde_json::to_string_pretty(signals)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let app = agent_utils::Config::from_env();
    agent_utils::init_tracing_with("warn,agent_analysts=info", app.log_json);

    let args = Args::parse();

    if args.list_models {
        println!("{}", models_table());
        println!("{}", analysts_table());
        return Ok(());
    }

    let tickers = normalize_tickers(&args.tickers);
    if tickers.is_empty() {
        bail!("no tickers given");
    }
    let (start, end) = resolve_dates(args.start_date, args.end_date, Local::now().date_naive())?;

    let mut builder = AnalysisConfig::builder()
        .model(&args.model)
        .max_attempts(args.max_attempts)
        .show_reasoning(args.show_reasoning)
        .with_env_keys();
    if let Some(provider) = args.provider {
        builder = builder.provider(provider);
    }
    let config = builder.build()?;

    let context = AnalystContext::from_config(&config)?;
    let analysts = build_analysts(&args.analysts, &context)?;
    let runner = AnalysisRunner::new(analysts, context.progress.clone());

    info!(environment = %app.environment, model = %config.model_name, "Starting");
    let state = AgentState::new(tickers, start, end, config.metadata()?);
    let state = runner.run(state).await?;

    for line in context.progress.render() {
        eprintln!("{line}");
    }
    if config.show_reasoning {
        print_reasoning(&state)?;
    }
    println!("{}", signals_table(&state));

    Ok(())
}
