use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info};

use crate::api::latency::LatencyStats;
use crate::config::{Config, LeagueConfig, FINAL_RESULT_TYPE_ID, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::importer::matcher::{ProviderFixture, ProviderTeam};

// ---------------------------------------------------------------------------
// OpenLigaDB
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenLigaTeam {
    pub team_name: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenLigaResult {
    #[serde(rename = "resultTypeID")]
    pub result_type_id: i64,
    pub points_team1: i64,
    pub points_team2: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenLigaMatch {
    #[serde(rename = "matchID")]
    pub match_id: i64,
    pub team1: OpenLigaTeam,
    pub team2: OpenLigaTeam,
    #[serde(default)]
    pub match_is_finished: bool,
    #[serde(default)]
    pub match_results: Vec<OpenLigaResult>,
}

impl OpenLigaMatch {
    /// The "Endergebnis" entry, present once the provider has a final score.
    pub fn final_result(&self) -> Option<&OpenLigaResult> {
        self.match_results
            .iter()
            .find(|r| r.result_type_id == FINAL_RESULT_TYPE_ID)
    }
}

impl ProviderFixture for OpenLigaMatch {
    fn home(&self) -> ProviderTeam<'_> {
        ProviderTeam {
            name: &self.team1.team_name,
            short_name: self.team1.short_name.as_deref(),
        }
    }

    fn away(&self) -> ProviderTeam<'_> {
        ProviderTeam {
            name: &self.team2.team_name,
            short_name: self.team2.short_name.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// The Odds API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OddsOutcome {
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsMarket {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<OddsOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsBookmaker {
    pub key: String,
    #[serde(default)]
    pub markets: Vec<OddsMarket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsEvent {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<OddsBookmaker>,
}

impl OddsEvent {
    /// Head-to-head "Draw" price quoted by `bookmaker`, ignoring every other listing.
    pub fn draw_price(&self, bookmaker: &str) -> Option<f64> {
        self.bookmakers
            .iter()
            .find(|b| b.key == bookmaker)?
            .markets
            .iter()
            .find(|m| m.key == "h2h")?
            .outcomes
            .iter()
            .find(|o| o.name == "Draw")
            .map(|o| o.price)
    }
}

impl ProviderFixture for OddsEvent {
    fn home(&self) -> ProviderTeam<'_> {
        ProviderTeam { name: &self.home_team, short_name: None }
    }

    fn away(&self) -> ProviderTeam<'_> {
        ProviderTeam { name: &self.away_team, short_name: None }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}

/// All fixtures of one round from OpenLigaDB.
pub async fn fetch_openliga_matchday(
    client: &reqwest::Client,
    cfg: &Config,
    league: &LeagueConfig,
    matchday: i64,
    latency: &LatencyStats,
) -> Result<Vec<OpenLigaMatch>> {
    let url = format!(
        "{}/getmatchdata/{}/{}/{}",
        cfg.openliga_api_url.trim_end_matches('/'),
        league.openliga_key,
        cfg.season,
        matchday
    );

    let started = Instant::now();
    let resp = client.get(&url).send().await;
    latency.record(started.elapsed());
    let resp = resp?;

    if !resp.status().is_success() {
        return Err(AppError::Upstream { status: resp.status().as_u16(), url });
    }
    let matches: Vec<OpenLigaMatch> = resp.json().await?;
    debug!(league = %league.shortcut, matchday, count = matches.len(), "OpenLigaDB returned {} fixtures", matches.len());
    Ok(matches)
}

/// Upcoming events of one division priced by the configured bookmaker.
pub async fn fetch_bookmaker_odds(
    client: &reqwest::Client,
    cfg: &Config,
    league: &LeagueConfig,
    latency: &LatencyStats,
) -> Result<Vec<OddsEvent>> {
    let url = format!("{}/sports/{}/odds/", cfg.odds_api_url.trim_end_matches('/'), league.odds_key);

    let started = Instant::now();
    let resp = client
        .get(&url)
        .query(&[
            ("apiKey", cfg.odds_api_key.as_str()),
            ("regions", "eu"),
            ("markets", "h2h"),
            ("oddsFormat", "decimal"),
            ("bookmakers", cfg.odds_bookmaker.as_str()),
        ])
        .send()
        .await;
    latency.record(started.elapsed());
    let resp = resp?;

    if !resp.status().is_success() {
        return Err(AppError::Upstream { status: resp.status().as_u16(), url });
    }
    if let Some(remaining) = resp
        .headers()
        .get("x-requests-remaining")
        .and_then(|v| v.to_str().ok())
    {
        info!(league = %league.shortcut, remaining, "Odds API quota remaining: {remaining}");
    }

    let events: Vec<OddsEvent> = resp.json().await?;
    debug!(league = %league.shortcut, count = events.len(), "Odds API returned {} events", events.len());
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openliga_fixture() {
        let raw = r#"[{
            "matchID": 72001,
            "team1": {"teamName": "FC Bayern München", "shortName": "Bayern"},
            "team2": {"teamName": "RB Leipzig", "shortName": "Leipzig"},
            "matchIsFinished": true,
            "matchResults": [
                {"resultTypeID": 1, "pointsTeam1": 1, "pointsTeam2": 0},
                {"resultTypeID": 2, "pointsTeam1": 3, "pointsTeam2": 1}
            ]
        }]"#;
        let parsed: Vec<OpenLigaMatch> = serde_json::from_str(raw).unwrap();
        let fin = parsed[0].final_result().unwrap();
        assert_eq!((fin.points_team1, fin.points_team2), (3, 1));
        assert_eq!(parsed[0].home().short_name, Some("Bayern"));
    }

    #[test]
    fn halftime_only_has_no_final_result() {
        let raw = r#"{
            "matchID": 1,
            "team1": {"teamName": "A"},
            "team2": {"teamName": "B"},
            "matchIsFinished": false,
            "matchResults": [{"resultTypeID": 1, "pointsTeam1": 0, "pointsTeam2": 0}]
        }"#;
        let parsed: OpenLigaMatch = serde_json::from_str(raw).unwrap();
        assert!(parsed.final_result().is_none());
    }

    #[test]
    fn draw_price_reads_only_the_named_bookmaker() {
        let raw = r#"{
            "id": "e1",
            "home_team": "Hamburger SV",
            "away_team": "FC St. Pauli",
            "bookmakers": [
                {"key": "other", "markets": [{"key": "h2h", "outcomes": [{"name": "Draw", "price": 9.0}]}]},
                {"key": "tipico_de", "markets": [
                    {"key": "totals", "outcomes": [{"name": "Draw", "price": 7.0}]},
                    {"key": "h2h", "outcomes": [
                        {"name": "Hamburger SV", "price": 2.1},
                        {"name": "Draw", "price": 3.4},
                        {"name": "FC St. Pauli", "price": 3.3}
                    ]}
                ]}
            ]
        }"#;
        let event: OddsEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.draw_price("tipico_de"), Some(3.4));
        assert_eq!(event.draw_price("missing"), None);
    }
}
