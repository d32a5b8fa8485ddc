use tracing::{debug, info, warn};

use crate::config::LeagueConfig;
use crate::db::store;
use crate::fetcher::fetch_bookmaker_odds;
use crate::importer::matcher::{find_fixture, TeamKeys};
use crate::importer::{ImportReport, Importer, RunSummary};

/// Store the configured bookmaker's draw price on every open fixture of
/// each division's current matchday.
pub async fn run_odds_import(importer: &Importer) -> ImportReport {
    let mut report = ImportReport::new();
    if importer.cfg.odds_api_key.is_empty() {
        warn!("ODDS_API_KEY is not set, odds import disabled");
        for league in &importer.cfg.leagues {
            report.push(RunSummary { skipped: true, ..RunSummary::new(&league.shortcut) });
        }
        return report;
    }

    for league in &importer.cfg.leagues {
        report.push(import_league(importer, league).await);
    }
    report
}

async fn import_league(importer: &Importer, league: &LeagueConfig) -> RunSummary {
    let mut summary = RunSummary::new(&league.shortcut);
    let season = importer.cfg.season.as_str();

    let fixtures = match store::current_open_matchday(&importer.pool, &league.shortcut, season).await {
        Ok(Some(matchday)) => {
            summary.matchday = Some(matchday);
            store::fixtures_for_import(&importer.pool, &league.shortcut, season, matchday).await
        }
        Ok(None) => Ok(Vec::new()),
        Err(e) => Err(e),
    };
    let fixtures: Vec<_> = match fixtures {
        Ok(rows) => rows.into_iter().filter(|f| !f.is_finished).collect(),
        Err(e) => {
            warn!(league = %league.shortcut, "Could not load open fixtures: {e}");
            summary.errors += 1;
            summary.skipped = true;
            return summary;
        }
    };
    summary.local_fixtures = fixtures.len();
    if fixtures.is_empty() {
        info!(league = %league.shortcut, "No open fixtures for {}, skipping", league.name);
        summary.skipped = true;
        return summary;
    }

    let events = match fetch_bookmaker_odds(&importer.client, &importer.cfg, league, &importer.latency).await {
        Ok(events) => events,
        Err(e) => {
            warn!(league = %league.shortcut, "Odds API unavailable, skipping division: {e}");
            summary.errors += 1;
            summary.skipped = true;
            return summary;
        }
    };
    summary.provider_fixtures = events.len();
    if events.is_empty() {
        info!(league = %league.shortcut, "Odds API listed no events");
        summary.skipped = true;
        return summary;
    }

    let bookmaker = importer.cfg.odds_bookmaker.as_str();
    for fixture in &fixtures {
        let home = TeamKeys {
            external_id: fixture.home_odds_id.as_deref(),
            name: &fixture.home_name,
            short_name: &fixture.home_short_name,
        };
        let away = TeamKeys {
            external_id: fixture.away_odds_id.as_deref(),
            name: &fixture.away_name,
            short_name: &fixture.away_short_name,
        };

        let Some(event) = find_fixture(&home, &away, &events) else {
            debug!(match_id = fixture.id, "No odds event for {} vs {}", fixture.home_short_name, fixture.away_short_name);
            summary.unmatched += 1;
            continue;
        };
        let Some(price) = event.draw_price(bookmaker) else {
            summary.pending += 1;
            continue;
        };

        match store::update_match_draw_odds(&importer.pool, fixture.id, price).await {
            Ok(()) => {
                summary.updated += 1;
                debug!(match_id = fixture.id, price, "X {price:.2} for {} vs {}", fixture.home_short_name, fixture.away_short_name);
            }
            Err(e) => {
                warn!(match_id = fixture.id, "Draw odds update failed: {e}");
                summary.errors += 1;
            }
        }
    }

    info!(
        league = %league.shortcut,
        updated = summary.updated,
        unmatched = summary.unmatched,
        errors = summary.errors,
        "Odds {}: {} updated, {} unmatched",
        league.shortcut,
        summary.updated,
        summary.unmatched,
    );
    summary
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    use super::*;
    use crate::db::models::NewTeam;
    use crate::db::store::fixtures::{fixture, team};
    use crate::db::test_pool;
    use crate::importer::testing::{importer, serve};

    async fn seeded() -> sqlx::SqlitePool {
        let pool = test_pool().await;
        store::insert_team(
            &pool,
            &NewTeam {
                id: 1,
                name: "1. FC Heidenheim 1846".to_string(),
                short_name: "Heidenheim".to_string(),
                league_shortcut: "bl1".to_string(),
                games_to_wait_after_draw: 0,
                openliga_api_id: None,
                odds_api_id: Some("1. FC Heidenheim".to_string()),
            },
        )
        .await
        .unwrap();
        team(&pool, 2, "FC Augsburg", "Augsburg", "bl1").await;
        team(&pool, 3, "1. FC Union Berlin", "Union", "bl1").await;
        team(&pool, 4, "Borussia Mönchengladbach", "Gladbach", "bl1").await;
        fixture(&pool, 20, 1, 1, 2, "bl1").await;
        fixture(&pool, 21, 1, 3, 4, "bl1").await;
        pool
    }

    async fn odds_feed(Query(params): Query<HashMap<String, String>>) -> Result<Json<serde_json::Value>, StatusCode> {
        if params.get("apiKey").map(String::as_str) != Some("test-key")
            || params.get("bookmakers").map(String::as_str) != Some("tipico_de")
        {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(json!([
            {
                "id": "a",
                "home_team": "1. FC Heidenheim",
                "away_team": "FC Augsburg",
                "bookmakers": [{"key": "tipico_de", "markets": [{"key": "h2h", "outcomes": [
                    {"name": "1. FC Heidenheim", "price": 2.6},
                    {"name": "Draw", "price": 3.3},
                    {"name": "FC Augsburg", "price": 2.7}
                ]}]}]
            },
            {
                "id": "b",
                "home_team": "Union Berlin",
                "away_team": "Borussia Monchengladbach",
                "bookmakers": []
            }
        ])))
    }

    #[tokio::test]
    async fn draw_price_written_for_matched_fixture() {
        let pool = seeded().await;
        let base = serve(Router::new().route("/sports/soccer_germany_bundesliga/odds/", get(odds_feed))).await;
        let importer = importer(pool.clone(), &base);

        let report = run_odds_import(&importer).await;
        let bl1 = &report.leagues[0];
        assert_eq!(bl1.updated, 1);
        assert_eq!(bl1.unmatched, 1);
        assert_eq!(store::get_match(&pool, 20).await.unwrap().odds_x, Some(3.3));
        assert_eq!(store::get_match(&pool, 21).await.unwrap().odds_x, None);

        // no change gate: the same price is written again
        let again = run_odds_import(&importer).await;
        assert_eq!(again.total_updated, 1);
    }

    #[tokio::test]
    async fn missing_key_disables_import() {
        let pool = seeded().await;
        let mut importer = importer(pool, "http://127.0.0.1:9");
        importer.cfg.odds_api_key.clear();
        let report = run_odds_import(&importer).await;
        assert!(report.success);
        assert!(report.leagues.iter().all(|l| l.skipped));
    }

    #[tokio::test]
    async fn odds_api_outage_skips_division() {
        let pool = seeded().await;
        let provider = Router::new().route(
            "/sports/soccer_germany_bundesliga/odds/",
            get(|| async { StatusCode::TOO_MANY_REQUESTS }),
        );
        let base = serve(provider).await;
        let importer = importer(pool.clone(), &base);

        let report = run_odds_import(&importer).await;
        let bl1 = &report.leagues[0];
        assert!(bl1.skipped);
        assert_eq!(bl1.errors, 1);
        assert!(!report.success);
        assert_eq!(store::get_match(&pool, 20).await.unwrap().odds_x, None);
    }

    #[tokio::test]
    async fn no_events_listed_is_not_an_error() {
        let pool = seeded().await;
        let provider = Router::new().route(
            "/sports/soccer_germany_bundesliga/odds/",
            get(|| async { Json(json!([])) }),
        );
        let base = serve(provider).await;
        let importer = importer(pool, &base);

        let report = run_odds_import(&importer).await;
        let bl1 = &report.leagues[0];
        assert!(bl1.skipped);
        assert_eq!(bl1.provider_fixtures, 0);
        assert_eq!(report.total_errors, 0);
        assert!(report.success);
    }

    #[tokio::test]
    async fn failed_write_is_counted_and_run_continues() {
        let pool = seeded().await;
        sqlx::query(
            "CREATE TRIGGER lock_heidenheim BEFORE UPDATE ON matches WHEN NEW.id = 20 \
             BEGIN SELECT RAISE(ABORT, 'locked'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        let base = serve(Router::new().route("/sports/soccer_germany_bundesliga/odds/", get(odds_feed))).await;
        let importer = importer(pool.clone(), &base);

        let report = run_odds_import(&importer).await;
        let bl1 = &report.leagues[0];
        assert_eq!(bl1.errors, 1);
        assert_eq!(bl1.updated, 0);
        // the second fixture is still looked up after the failed write
        assert_eq!(bl1.unmatched, 1);
        assert!(!report.success);
        assert_eq!(store::get_match(&pool, 20).await.unwrap().odds_x, None);
    }
}
