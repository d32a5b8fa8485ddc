use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use monbetsx::api::health::HealthState;
use monbetsx::api::latency::LatencyStats;
use monbetsx::api::routes::{router, ApiState};
use monbetsx::config::Config;
use monbetsx::error::Result;
use monbetsx::fetcher::http_client;
use monbetsx::importer::{ImportScheduler, Importer};
use monbetsx::stakes::{EscalationPolicy, StakePolicy};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cfg = match Config::from_env().and_then(|c| c.require_dashboard_password().map(|_| c)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = monbetsx::db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    if cfg.odds_api_key.is_empty() {
        warn!("ODDS_API_KEY not set: the odds import will skip every division.");
    }

    let importer = Arc::new(Importer {
        pool: pool.clone(),
        cfg: cfg.clone(),
        client: http_client()?,
        latency: Arc::new(LatencyStats::new()),
        health: Arc::new(HealthState::new()),
    });

    // In-process import schedule (disabled when IMPORT_INTERVAL_SECS=0)
    if cfg.import_interval_secs > 0 {
        let scheduler = ImportScheduler::new(Arc::clone(&importer), Duration::from_secs(cfg.import_interval_secs));
        tokio::spawn(async move { scheduler.run().await });
        info!("Import scheduler running every {}s", cfg.import_interval_secs);
    } else {
        info!("Import scheduler disabled; trigger imports via /jobs or monbetsx-import");
    }

    let policy: Arc<dyn StakePolicy> = Arc::new(EscalationPolicy {
        base_stake: cfg.base_stake,
        factor: cfg.escalation_factor,
    });

    // HTTP API server
    let app = router(ApiState::new(importer, policy));
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr} (season {})", cfg.season);

    axum::serve(listener, app).await?;

    Ok(())
}
