//! One-shot import run for an external scheduler (cron, systemd timer).
//!
//! Usage: `monbetsx-import [results|odds|all]` (default `all`). Prints the
//! reports as JSON. Failed divisions are reported, not fatal.

use std::sync::Arc;

use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use monbetsx::api::health::HealthState;
use monbetsx::api::latency::LatencyStats;
use monbetsx::config::Config;
use monbetsx::error::{AppError, Result};
use monbetsx::fetcher::http_client;
use monbetsx::importer::{ImportKind, Importer};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cfg).await {
        error!("Import failed: {e}");
        std::process::exit(1);
    }
}

fn kinds(arg: Option<&str>) -> Result<Vec<ImportKind>> {
    match arg.unwrap_or("all") {
        "results" => Ok(vec![ImportKind::Results]),
        "odds" => Ok(vec![ImportKind::Odds]),
        "all" => Ok(vec![ImportKind::Results, ImportKind::Odds]),
        other => Err(AppError::Config(format!(
            "unknown job {other:?}, expected results, odds or all"
        ))),
    }
}

async fn run(cfg: Config) -> Result<()> {
    let arg = std::env::args().nth(1);
    let kinds = kinds(arg.as_deref())?;

    let pool = monbetsx::db::connect(&cfg.db_path).await?;
    let importer = Importer {
        pool,
        cfg,
        client: http_client()?,
        latency: Arc::new(LatencyStats::new()),
        health: Arc::new(HealthState::new()),
    };

    let mut out = serde_json::Map::new();
    for kind in kinds {
        let report = importer.run(kind).await;
        if !report.success {
            warn!(job = %kind, "{} division errors, see report", report.total_errors);
        }
        out.insert(kind.to_string(), serde_json::to_value(report)?);
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
