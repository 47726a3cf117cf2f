//! Scraper runner: one pass over every configured source, saved to the store.
//!
//! Exit status is 0 when at least one source produced stored records, 1 otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use pricing_intel::ingest::config::load_config;
use pricing_intel::ingest::providers::{build_orchestrator, catalogue::CatalogueAdapter};
use pricing_intel::ingest::run_pass;
use pricing_intel::logging::init_tracing;
use pricing_intel::{Orchestrator, PricingStore, RunReport};

#[derive(Debug, Parser)]
#[command(name = "run-scrapers", about = "Run all pricing scrapers once and save to the DB")]
struct Args {
    /// Config file (TOML or JSON); defaults to $PRICING_CONFIG_PATH / config/pricing.*
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only load the built-in catalogue (seed the database).
    #[arg(long)]
    seed: bool,

    /// Override the configured source list (comma separated).
    #[arg(long, value_delimiter = ',')]
    sources: Vec<String>,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json_report: bool,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let code = match run(Args::parse()).await {
        Ok(report) => report.exit_code(),
        Err(e) => {
            tracing::error!("fatal error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> Result<RunReport> {
    let mut cfg = load_config(args.config.as_deref())?;
    if !args.sources.is_empty() {
        cfg = cfg.with_sources(args.sources.iter().cloned());
    }

    let orchestrator = if args.seed {
        Orchestrator::new(cfg.retry_policy()).with_adapter(CatalogueAdapter::known())
    } else {
        build_orchestrator(&cfg)
    };

    let store = Arc::new(
        PricingStore::open(&cfg.db_path)
            .with_context(|| format!("opening store {}", cfg.db_path.display()))?,
    );

    // Ctrl-C aborts in-flight fetches; whatever finished is still saved.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling in-flight scrapers");
            on_signal.cancel();
        }
    });

    let report = run_pass(&orchestrator, &store, cancel).await;
    signal_task.abort();
    report.log();

    if args.json_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    match Arc::try_unwrap(store) {
        Ok(store) => store.close().context("closing store")?,
        Err(_) => tracing::warn!("store still shared at shutdown; closing on drop"),
    }

    Ok(report)
}
