//! Shared health state for the /health endpoint.
//! Updated by the importers, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::importer::{ImportKind, ImportReport};

#[derive(Default)]
struct JobHealth {
    /// Unix seconds of the last completed run (0 = never).
    last_run_at: AtomicU64,
    last_updated: AtomicU64,
    /// Runs in a row that reported at least one error.
    consecutive_failures: AtomicU64,
}

impl JobHealth {
    fn record(&self, report: &ImportReport) {
        self.last_run_at
            .store(report.timestamp.timestamp().max(0) as u64, Ordering::Relaxed);
        self.last_updated
            .store(report.total_updated as u64, Ordering::Relaxed);
        if report.success {
            self.consecutive_failures.store(0, Ordering::Relaxed);
        } else {
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn view(&self) -> JobHealthView {
        let last_run_at = self.last_run_at.load(Ordering::Relaxed);
        JobHealthView {
            last_run_at: (last_run_at > 0).then_some(last_run_at),
            last_updated: self.last_updated.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JobHealthView {
    pub last_run_at: Option<u64>,
    pub last_updated: u64,
    pub consecutive_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthView {
    pub status: &'static str,
    pub results_import: JobHealthView,
    pub odds_import: JobHealthView,
}

#[derive(Default)]
pub struct HealthState {
    results: JobHealth,
    odds: JobHealth,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: ImportKind, report: &ImportReport) {
        match kind {
            ImportKind::Results => self.results.record(report),
            ImportKind::Odds => self.odds.record(report),
        }
    }

    pub fn view(&self) -> HealthView {
        HealthView {
            status: "ok",
            results_import: self.results.view(),
            odds_import: self.odds.view(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_accumulate_until_a_clean_run() {
        let health = HealthState::new();
        let mut report = ImportReport::new();
        report.success = false;
        health.record(ImportKind::Odds, &report);
        health.record(ImportKind::Odds, &report);
        assert_eq!(health.view().odds_import.consecutive_failures, 2);

        report.success = true;
        report.total_updated = 5;
        health.record(ImportKind::Odds, &report);
        let view = health.view();
        assert_eq!(view.odds_import.consecutive_failures, 0);
        assert_eq!(view.odds_import.last_updated, 5);
        assert_eq!(view.results_import.last_run_at, None);
    }
}
