use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, info_span, Instrument};

use crate::api::auth::{login, logout, require_session, SessionStore};
use crate::api::health::HealthView;
use crate::api::latency::LatencySnapshot;
use crate::api::views::{self, BettingSheet, LeagueStatistics, LeagueTeams, Overview, StakeBook};
use crate::calc::{alternative_stake, needs_stake_adjustment, validate_stake, Odds};
use crate::config::{Config, MAX_WAIT_AFTER_DRAW};
use crate::db::models::{Bet, Match};
use crate::db::store;
use crate::error::{AppError, Result};
use crate::importer::{ImportKind, ImportReport, Importer};
use crate::stakes::{
    calculate_stakes_after_matchday, recalculate_all_stakes_from_last_draw, StakePolicy, StakeRunSummary,
};
use crate::types::Side;

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub cfg: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub policy: Arc<dyn StakePolicy>,
    pub importer: Arc<Importer>,
}

impl ApiState {
    pub fn new(importer: Arc<Importer>, policy: Arc<dyn StakePolicy>) -> Self {
        Self {
            pool: importer.pool.clone(),
            cfg: Arc::new(importer.cfg.clone()),
            sessions: Arc::new(SessionStore::new()),
            policy,
            importer,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/matchdays", get(get_matchdays))
        .route("/overview", get(get_overview))
        .route("/teams", get(get_teams))
        .route("/teams/settings", put(put_team_settings))
        .route("/bets", get(get_bets))
        .route("/bets/:match_id/odds", post(post_bet_odds))
        .route("/bets/:match_id/reduce", post(post_reduce_stake))
        .route("/bets/:match_id/abort", post(post_abort))
        .route("/statistics", get(get_statistics))
        .route("/stakes/calculate", post(post_calculate_stakes))
        .route("/stakes/recalculate", post(post_recalculate_stakes))
        .route("/jobs/results", post(post_results_job))
        .route("/jobs/odds", post(post_odds_job))
        .route("/stats/latency", get(get_stats_latency))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(get_health))
        .route("/api/auth/login", post(login))
        .merge(protected)
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}

async fn trace_request(req: Request, next: Next) -> Response {
    let span = info_span!("request", method = %req.method(), path = %req.uri().path());
    let started = Instant::now();
    let resp = next.run(req).instrument(span.clone()).await;
    span.in_scope(|| {
        debug!(
            status = resp.status().as_u16(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "request handled"
        );
    });
    resp
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct MatchdayQuery {
    pub matchday: Option<i64>,
}

#[derive(Deserialize)]
pub struct WaitSetting {
    pub team_id: i64,
    pub games_to_wait_after_draw: i64,
}

#[derive(Deserialize)]
pub struct OddsRequest {
    pub odds: f64,
}

#[derive(Deserialize)]
pub struct ReduceRequest {
    pub side: Side,
    pub odds: f64,
}

#[derive(Deserialize)]
pub struct AbortRequest {
    pub side: Side,
}

#[derive(Deserialize)]
pub struct CalculateRequest {
    pub matchday: i64,
    pub league: String,
}

#[derive(Deserialize)]
pub struct RecalculateRequest {
    pub league: String,
}

#[derive(Serialize)]
pub struct MatchdaysResponse {
    pub season: String,
    pub available: Vec<i64>,
    pub latest_finished: Option<i64>,
    pub next_upcoming: Option<i64>,
}

#[derive(Serialize)]
pub struct SettingsResponse {
    pub updated: usize,
}

#[derive(Serialize)]
pub struct BetResponse {
    pub match_id: i64,
    pub odds: f64,
    pub home_stake: f64,
    pub away_stake: f64,
    pub total_stake: f64,
    /// Present when a side is over the alert threshold.
    pub alternative_stake: Option<f64>,
}

#[derive(Serialize)]
pub struct ReduceResponse {
    pub match_id: i64,
    pub team_id: i64,
    pub side: Side,
    pub stake: f64,
    pub total_stake: f64,
}

#[derive(Serialize)]
pub struct AbortResponse {
    pub match_id: i64,
    pub side: Side,
    pub aborted: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthView> {
    Json(state.importer.health.view())
}

async fn get_matchdays(State(state): State<ApiState>) -> Result<Json<MatchdaysResponse>> {
    let season = state.cfg.season.as_str();
    Ok(Json(MatchdaysResponse {
        season: season.to_string(),
        available: store::available_matchdays(&state.pool, season).await?,
        latest_finished: store::latest_finished_matchday(&state.pool, season).await?,
        next_upcoming: store::next_upcoming_matchday(&state.pool, season, Utc::now()).await?,
    }))
}

async fn get_overview(
    State(state): State<ApiState>,
    Query(params): Query<MatchdayQuery>,
) -> Result<Json<Overview>> {
    let season = state.cfg.season.as_str();
    let matchday = match params.matchday {
        Some(day) => Some(day),
        None => match store::latest_finished_matchday(&state.pool, season).await? {
            Some(day) => Some(day),
            None => store::available_matchdays(&state.pool, season).await?.first().copied(),
        },
    };

    let teams = store::list_teams(&state.pool).await?;
    let matches = store::list_matches_for_season(&state.pool, season).await?;
    let bets = store::bets_for_season(&state.pool, season).await?;
    Ok(Json(views::overview(&state.cfg.leagues, matchday, &teams, &matches, &bets)))
}

async fn get_teams(State(state): State<ApiState>) -> Result<Json<Vec<LeagueTeams>>> {
    let teams = store::list_teams(&state.pool).await?;
    let matches = store::list_matches_for_season(&state.pool, &state.cfg.season).await?;
    Ok(Json(views::team_table(&state.cfg.leagues, &teams, &matches)))
}

async fn put_team_settings(
    State(state): State<ApiState>,
    Json(settings): Json<Vec<WaitSetting>>,
) -> Result<Json<SettingsResponse>> {
    if let Some(bad) = settings
        .iter()
        .find(|s| !(0..=MAX_WAIT_AFTER_DRAW).contains(&s.games_to_wait_after_draw))
    {
        return Err(AppError::Validation(format!(
            "games_to_wait_after_draw for team {} must be between 0 and {MAX_WAIT_AFTER_DRAW}, got {}",
            bad.team_id, bad.games_to_wait_after_draw
        )));
    }
    let changes: Vec<(i64, i64)> = settings
        .iter()
        .map(|s| (s.team_id, s.games_to_wait_after_draw))
        .collect();
    let updated = store::update_games_to_wait(&state.pool, &changes).await?;
    info!(updated, "Team wait settings saved");
    Ok(Json(SettingsResponse { updated }))
}

async fn get_bets(
    State(state): State<ApiState>,
    Query(params): Query<MatchdayQuery>,
) -> Result<Json<BettingSheet>> {
    let season = state.cfg.season.as_str();
    let matchday = match params.matchday {
        Some(day) => Some(day),
        None => match store::next_upcoming_matchday(&state.pool, season, Utc::now()).await? {
            Some(day) => Some(day),
            None => store::available_matchdays(&state.pool, season).await?.last().copied(),
        },
    };

    let teams = store::list_teams(&state.pool).await?;
    let (matches, stakes, bets): (Vec<Match>, _, _) = match matchday {
        Some(day) => (
            store::list_matches_for_season(&state.pool, season)
                .await?
                .into_iter()
                .filter(|m| m.matchday == day)
                .collect(),
            store::stakes_for_matchday(&state.pool, season, day).await?,
            store::bets_for_matchday(&state.pool, season, day).await?,
        ),
        None => (Vec::new(), Vec::new(), Vec::new()),
    };
    let book = StakeBook::new(&stakes, state.cfg.stake_floor);
    Ok(Json(views::betting_sheet(&state.cfg.leagues, matchday, &teams, &matches, &book, &bets)))
}

/// Home and away stakes of a fixture on its matchday, floor applied.
async fn match_stakes(state: &ApiState, m: &Match) -> Result<(f64, f64)> {
    let rows = store::stakes_for_matchday(&state.pool, &state.cfg.season, m.matchday).await?;
    Ok(StakeBook::new(&rows, state.cfg.stake_floor).for_match(m))
}

/// Odds and stakes are frozen once a fixture kicks off or its bet is settled.
fn ensure_open_for_betting(m: &Match, bet: Option<&Bet>, now: DateTime<Utc>) -> Result<()> {
    if m.is_finished || m.match_date <= now {
        return Err(AppError::Validation(format!("match {} has already kicked off", m.id)));
    }
    if bet.is_some_and(|b| b.is_evaluated) {
        return Err(AppError::Validation(format!("bet on match {} is already settled", m.id)));
    }
    Ok(())
}

async fn post_bet_odds(
    State(state): State<ApiState>,
    Path(match_id): Path<i64>,
    Json(body): Json<OddsRequest>,
) -> Result<Json<BetResponse>> {
    let odds = Odds::new(body.odds)?;
    let m = store::get_match(&state.pool, match_id).await?;
    let bet = store::get_bet(&state.pool, match_id).await?;
    ensure_open_for_betting(&m, bet.as_ref(), Utc::now())?;
    let (home_stake, away_stake) = match_stakes(&state, &m).await?;
    let total_stake = home_stake + away_stake;

    store::upsert_bet(
        &state.pool,
        m.id,
        m.matchday,
        &state.cfg.season,
        odds.value(),
        home_stake,
        away_stake,
    )
    .await?;
    info!(match_id, odds = odds.value(), total_stake, "Bet saved");

    Ok(Json(BetResponse {
        match_id,
        odds: odds.value(),
        home_stake,
        away_stake,
        total_stake,
        alternative_stake: needs_stake_adjustment(home_stake, away_stake)
            .then(|| alternative_stake(total_stake, odds)),
    }))
}

async fn post_reduce_stake(
    State(state): State<ApiState>,
    Path(match_id): Path<i64>,
    Json(body): Json<ReduceRequest>,
) -> Result<Json<ReduceResponse>> {
    let odds = Odds::new(body.odds)?;
    let m = store::get_match(&state.pool, match_id).await?;
    let bet = store::get_bet(&state.pool, match_id).await?;
    ensure_open_for_betting(&m, bet.as_ref(), Utc::now())?;
    let (home_stake, away_stake) = match_stakes(&state, &m).await?;
    if !needs_stake_adjustment(home_stake, away_stake) {
        return Err(AppError::Validation(format!(
            "no stake of match {match_id} is over the alert threshold"
        )));
    }

    let alternative = alternative_stake(home_stake + away_stake, odds);
    let other = match body.side {
        Side::Home => away_stake,
        Side::Away => home_stake,
    };
    let stake = validate_stake(alternative - other).map_err(|_| {
        AppError::Validation(format!(
            "reduced stake would be negative: alternative {alternative:.2} is below the other side's {other:.2}"
        ))
    })?;

    let team_id = m.team_on(body.side);
    store::set_team_stake(&state.pool, team_id, m.matchday, &state.cfg.season, stake).await?;

    let (home_stake, away_stake) = match body.side {
        Side::Home => (stake, away_stake),
        Side::Away => (home_stake, stake),
    };
    // keep an already placed bet in step with the reduced stake
    if let Some(bet) = bet {
        store::upsert_bet(&state.pool, m.id, m.matchday, &state.cfg.season, bet.odds, home_stake, away_stake)
            .await?;
    }
    info!(match_id, team_id, side = %body.side, stake, "Stake reduced");

    Ok(Json(ReduceResponse {
        match_id,
        team_id,
        side: body.side,
        stake,
        total_stake: home_stake + away_stake,
    }))
}

async fn post_abort(
    State(state): State<ApiState>,
    Path(match_id): Path<i64>,
    Json(body): Json<AbortRequest>,
) -> Result<Json<AbortResponse>> {
    store::set_abort_flag(&state.pool, match_id, body.side).await?;
    info!(match_id, side = %body.side, "Escalation aborted");
    Ok(Json(AbortResponse { match_id, side: body.side, aborted: true }))
}

async fn get_statistics(State(state): State<ApiState>) -> Result<Json<Vec<LeagueStatistics>>> {
    let season = state.cfg.season.as_str();
    let teams = store::list_teams(&state.pool).await?;
    let matches = store::list_matches_for_season(&state.pool, season).await?;
    let stakes = store::stakes_for_season(&state.pool, season).await?;
    let bets = store::bets_for_season(&state.pool, season).await?;
    let book = StakeBook::new(&stakes, state.cfg.stake_floor);
    Ok(Json(views::statistics(&state.cfg.leagues, &teams, &matches, &book, &bets)))
}

fn known_league(state: &ApiState, league: &str) -> Result<()> {
    state
        .cfg
        .league(league)
        .map(|_| ())
        .ok_or_else(|| AppError::Validation(format!("unknown league {league:?}")))
}

async fn post_calculate_stakes(
    State(state): State<ApiState>,
    Json(body): Json<CalculateRequest>,
) -> Result<Json<StakeRunSummary>> {
    known_league(&state, &body.league)?;
    if body.matchday < 1 {
        return Err(AppError::Validation(format!("matchday must be positive, got {}", body.matchday)));
    }
    let summary = calculate_stakes_after_matchday(
        &state.pool,
        &*state.policy,
        body.matchday,
        &body.league,
        &state.cfg.season,
    )
    .await?;
    Ok(Json(summary))
}

async fn post_recalculate_stakes(
    State(state): State<ApiState>,
    Json(body): Json<RecalculateRequest>,
) -> Result<Json<StakeRunSummary>> {
    known_league(&state, &body.league)?;
    let summary =
        recalculate_all_stakes_from_last_draw(&state.pool, &*state.policy, &body.league, &state.cfg.season).await?;
    Ok(Json(summary))
}

async fn post_results_job(State(state): State<ApiState>) -> Json<ImportReport> {
    Json(state.importer.run(ImportKind::Results).await)
}

async fn post_odds_job(State(state): State<ApiState>) -> Json<ImportReport> {
    Json(state.importer.run(ImportKind::Odds).await)
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.importer.latency.snapshot())
}
