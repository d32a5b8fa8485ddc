pub mod matcher;
pub mod odds;
pub mod results;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::time::interval;
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Results,
    Odds,
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportKind::Results => write!(f, "results"),
            ImportKind::Odds => write!(f, "odds"),
        }
    }
}

/// Outcome of one division within a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub league: String,
    pub matchday: Option<i64>,
    pub local_fixtures: usize,
    pub provider_fixtures: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub unmatched: usize,
    /// Matched, but the provider has no usable value yet.
    pub pending: usize,
    pub errors: usize,
    /// The division was not processed (nothing open, provider unavailable, ...).
    pub skipped: bool,
}

impl RunSummary {
    pub fn new(league: &str) -> Self {
        Self {
            league: league.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub total_updated: usize,
    pub total_errors: usize,
    pub leagues: Vec<RunSummary>,
    pub timestamp: DateTime<Utc>,
}

impl ImportReport {
    pub fn new() -> Self {
        Self {
            success: true,
            total_updated: 0,
            total_errors: 0,
            leagues: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn push(&mut self, summary: RunSummary) {
        self.total_updated += summary.updated;
        self.total_errors += summary.errors;
        self.success = self.total_errors == 0;
        self.leagues.push(summary);
    }
}

impl Default for ImportReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything an import run needs. Shared by the scheduler, the job
/// endpoints and the one-shot binary.
pub struct Importer {
    pub pool: SqlitePool,
    pub cfg: Config,
    pub client: reqwest::Client,
    pub latency: Arc<LatencyStats>,
    pub health: Arc<HealthState>,
}

impl Importer {
    pub async fn run(&self, kind: ImportKind) -> ImportReport {
        let report = match kind {
            ImportKind::Results => results::run_results_import(self).await,
            ImportKind::Odds => odds::run_odds_import(self).await,
        };
        self.health.record(kind, &report);
        info!(
            job = %kind,
            updated = report.total_updated,
            errors = report.total_errors,
            "Import {kind} finished: {} updated, {} errors",
            report.total_updated,
            report.total_errors,
        );
        report
    }
}

/// Runs both imports every `period`, results first.
pub struct ImportScheduler {
    importer: Arc<Importer>,
    period: Duration,
}

impl ImportScheduler {
    pub fn new(importer: Arc<Importer>, period: Duration) -> Self {
        Self { importer, period }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.period);
        loop {
            ticker.tick().await;
            for kind in [ImportKind::Results, ImportKind::Odds] {
                let report = self.importer.run(kind).await;
                if !report.success {
                    warn!(job = %kind, "Scheduled {kind} import reported {} errors", report.total_errors);
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_fails_on_any_error() {
        let mut report = ImportReport::new();
        report.push(RunSummary { updated: 3, ..RunSummary::new("bl1") });
        assert!(report.success);
        report.push(RunSummary { errors: 1, skipped: true, ..RunSummary::new("bl2") });
        assert!(!report.success);
        assert_eq!(report.total_updated, 3);
        assert_eq!(report.total_errors, 1);
    }
}
