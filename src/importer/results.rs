use tracing::{debug, info, warn};

use crate::config::LeagueConfig;
use crate::db::models::ImportFixture;
use crate::db::store;
use crate::fetcher::{fetch_openliga_matchday, OpenLigaMatch};
use crate::importer::matcher::{find_fixture, TeamKeys};
use crate::importer::{ImportReport, Importer, RunSummary};

/// Pull final scores for each division's open matchday and store the ones
/// that changed. Failures are counted per division, never propagated.
pub async fn run_results_import(importer: &Importer) -> ImportReport {
    let mut report = ImportReport::new();
    for league in &importer.cfg.leagues {
        report.push(import_league(importer, league).await);
    }
    report
}

async fn import_league(importer: &Importer, league: &LeagueConfig) -> RunSummary {
    let mut summary = RunSummary::new(&league.shortcut);
    let season = importer.cfg.season.as_str();

    let matchday = match store::current_open_matchday(&importer.pool, &league.shortcut, season).await {
        Ok(Some(day)) => day,
        Ok(None) => {
            info!(league = %league.shortcut, "No open matchday for {}, skipping", league.name);
            summary.skipped = true;
            return summary;
        }
        Err(e) => {
            warn!(league = %league.shortcut, "Could not find open matchday: {e}");
            summary.errors += 1;
            summary.skipped = true;
            return summary;
        }
    };
    summary.matchday = Some(matchday);

    let fixtures = match store::fixtures_for_import(&importer.pool, &league.shortcut, season, matchday).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(league = %league.shortcut, matchday, "Could not load fixtures: {e}");
            summary.errors += 1;
            summary.skipped = true;
            return summary;
        }
    };
    summary.local_fixtures = fixtures.len();
    if fixtures.is_empty() {
        info!(league = %league.shortcut, matchday, "No local fixtures on matchday {matchday}");
        summary.skipped = true;
        return summary;
    }

    let provider = match fetch_openliga_matchday(&importer.client, &importer.cfg, league, matchday, &importer.latency).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(league = %league.shortcut, matchday, "Results API unavailable, skipping division: {e}");
            summary.errors += 1;
            summary.skipped = true;
            return summary;
        }
    };
    summary.provider_fixtures = provider.len();
    if provider.is_empty() {
        info!(league = %league.shortcut, matchday, "Results API returned no fixtures");
        summary.skipped = true;
        return summary;
    }

    for fixture in &fixtures {
        apply_fixture(importer, fixture, &provider, &mut summary).await;
    }

    info!(
        league = %league.shortcut,
        matchday,
        updated = summary.updated,
        unchanged = summary.unchanged,
        unmatched = summary.unmatched,
        pending = summary.pending,
        errors = summary.errors,
        "Results {} matchday {matchday}: {} updated, {} unmatched, {} pending",
        league.shortcut,
        summary.updated,
        summary.unmatched,
        summary.pending,
    );
    summary
}

async fn apply_fixture(
    importer: &Importer,
    fixture: &ImportFixture,
    provider: &[OpenLigaMatch],
    summary: &mut RunSummary,
) {
    let home = TeamKeys {
        external_id: fixture.home_openliga_id.as_deref(),
        name: &fixture.home_name,
        short_name: &fixture.home_short_name,
    };
    let away = TeamKeys {
        external_id: fixture.away_openliga_id.as_deref(),
        name: &fixture.away_name,
        short_name: &fixture.away_short_name,
    };

    let Some(found) = find_fixture(&home, &away, provider) else {
        debug!(match_id = fixture.id, "No provider fixture for {} vs {}", fixture.home_short_name, fixture.away_short_name);
        summary.unmatched += 1;
        return;
    };
    let Some(score) = found.final_result() else {
        summary.pending += 1;
        return;
    };

    let (home_goals, away_goals) = (score.points_team1, score.points_team2);
    let finished = found.match_is_finished;
    let changed = fixture.home_goals != Some(home_goals)
        || fixture.away_goals != Some(away_goals)
        || fixture.is_finished != finished;
    if !changed {
        summary.unchanged += 1;
        return;
    }

    match store::update_match_result(&importer.pool, fixture.id, home_goals, away_goals, finished).await {
        Ok(()) => {
            summary.updated += 1;
            info!(
                match_id = fixture.id,
                "{} {home_goals}:{away_goals} {} ({})",
                fixture.home_short_name,
                fixture.away_short_name,
                if finished { "finished" } else { "live" },
            );
        }
        Err(e) => {
            warn!(match_id = fixture.id, "Result update failed: {e}");
            summary.errors += 1;
        }
    }
}
