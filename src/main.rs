//! Robo Rebalancer - Main Entry Point
//!
//! Thin CLI shell around the rebalancing engine; responses print to
//! stdout as JSON, logs go to stderr and a rolling file.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use robo_rebalancer::config::{Config, JudgeMode};
use robo_rebalancer::engine::{AckRequest, Filters, RebalanceEngine, RebalanceRequest};
use robo_rebalancer::judge::{RemoteJudge, SignalSource, StubJudge};
use robo_rebalancer::orders::AckAction;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Robo Rebalancer CLI
#[derive(Parser)]
#[command(name = "robo-rebalancer")]
#[command(version, about = "Constraint-aware portfolio rebalancing with impact-aware pricing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose rebalancing orders for a set of accounts
    Rebalance {
        /// As-of date (YYYY-MM-DD)
        #[arg(short, long)]
        as_of: NaiveDate,

        /// Comma-separated account ids (default: every account the Judge serves)
        #[arg(long)]
        accounts: Option<String>,

        /// Minimum cash weight floor
        #[arg(long)]
        min_cash_pct: Option<Decimal>,

        /// Cap on any single security's weight
        #[arg(long)]
        max_security_weight: Option<Decimal>,

        /// Cap on any sector's summed weight
        #[arg(long)]
        max_sector_weight: Option<Decimal>,

        /// Blend coefficient toward the sentiment-derived target (0-1)
        #[arg(short, long, default_value = "0.20")]
        sentiment_weight: Decimal,

        /// Immediately acknowledge the proposed batch
        #[arg(long)]
        ack: bool,
    },
    /// Report engine and signal source liveness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate()?;
    log_config(&config);

    let judge = build_judge(&config)?;
    let engine = RebalanceEngine::new(&config, judge);

    match cli.command {
        Commands::Rebalance {
            as_of,
            accounts,
            min_cash_pct,
            max_security_weight,
            max_sector_weight,
            sentiment_weight,
            ack,
        } => {
            let mut filters = Filters::default();
            if let Some(accounts) = accounts {
                filters.account_ids = accounts
                    .split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect();
            }
            if let Some(min_cash_pct) = min_cash_pct {
                filters.min_cash_pct = min_cash_pct;
            }
            if let Some(max_security_weight) = max_security_weight {
                filters.max_security_weight = max_security_weight;
            }
            if let Some(max_sector_weight) = max_sector_weight {
                filters.max_sector_weight = max_sector_weight;
            }

            let request = RebalanceRequest {
                as_of,
                filters,
                sentiment_weight,
            };
            let batch = engine.rebalance(&request).await?;
            println!("{}", serde_json::to_string_pretty(&batch)?);

            if ack {
                let report = engine
                    .acknowledge(&AckRequest {
                        order_id: None,
                        batch_id: Some(batch.batch_id.clone()),
                        action: AckAction::Acknowledge,
                    })
                    .await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Commands::Health => {
            let report = engine.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Select the signal source implementation from configuration.
fn build_judge(config: &Config) -> Result<Arc<dyn SignalSource>> {
    match config.judge.mode {
        JudgeMode::Stub => {
            info!("Using canned stub judge");
            Ok(Arc::new(StubJudge::canned()))
        }
        JudgeMode::Remote => {
            info!(base_url = %config.judge.base_url, "Using remote judge");
            Ok(Arc::new(RemoteJudge::new(&config.judge)?))
        }
    }
}

/// Initialize logging with stderr and rolling file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "robo-rebalancer.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("robo_rebalancer=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stderr.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!(
        judge_mode = ?config.judge.mode,
        judge_timeout_secs = config.judge.timeout_secs,
        normalization = ?config.engine.normalization,
        projection_iterations = config.engine.max_projection_iterations,
        impact_max = %config.impact.impact_max,
        steepness = %config.impact.steepness,
        order_ttl_secs = config.orders.ttl_secs,
        lot_size = %config.orders.lot_size,
        "Configuration loaded"
    );
}
