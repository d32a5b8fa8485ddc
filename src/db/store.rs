//! Data access layer: every read and write against the four tables.
//! Last write wins per row; nothing here holds state between calls.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::models::{Bet, ImportFixture, Match, NewMatch, NewTeam, Team, TeamStake};
use crate::error::{AppError, Result};
use crate::types::{MatchResult, Side};

const MATCH_COLUMNS: &str = "id, matchday, home_team_id, away_team_id, match_date, home_goals, \
     away_goals, is_finished, result, league_shortcut, season, odds_x";

const BET_COLUMNS: &str = "id, match_id, matchday, season, odds, home_stake, away_stake, total_stake, \
     payout_home, payout_away, home_team_abort, away_team_abort, is_evaluated";

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

pub async fn list_teams(pool: &SqlitePool) -> Result<Vec<Team>> {
    let teams = sqlx::query_as::<_, Team>("SELECT * FROM teams ORDER BY name ASC")
        .fetch_all(pool)
        .await?;
    Ok(teams)
}

pub async fn list_teams_in_league(pool: &SqlitePool, league: &str) -> Result<Vec<Team>> {
    let teams = sqlx::query_as::<_, Team>(
        "SELECT * FROM teams WHERE league_shortcut = ? ORDER BY name ASC",
    )
    .bind(league)
    .fetch_all(pool)
    .await?;
    Ok(teams)
}

pub async fn get_team(pool: &SqlitePool, team_id: i64) -> Result<Team> {
    sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?")
        .bind(team_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("team {team_id}")))
}

pub async fn insert_team(pool: &SqlitePool, team: &NewTeam) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO teams (id, name, short_name, league_shortcut, games_to_wait_after_draw,
                           openliga_api_id, odds_api_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(team.id)
    .bind(&team.name)
    .bind(&team.short_name)
    .bind(&team.league_shortcut)
    .bind(team.games_to_wait_after_draw)
    .bind(&team.openliga_api_id)
    .bind(&team.odds_api_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Writes every `(team_id, games_to_wait_after_draw)` pair in one transaction.
/// Returns the number of teams updated; an unknown id rolls the whole batch back.
pub async fn update_games_to_wait(pool: &SqlitePool, changes: &[(i64, i64)]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    for &(team_id, games) in changes {
        let res = sqlx::query("UPDATE teams SET games_to_wait_after_draw = ? WHERE id = ?")
            .bind(games)
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("team {team_id}")));
        }
    }
    tx.commit().await?;
    Ok(changes.len())
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

pub async fn insert_match(pool: &SqlitePool, m: &NewMatch) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO matches (id, matchday, home_team_id, away_team_id, match_date,
                             league_shortcut, season)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(m.id)
    .bind(m.matchday)
    .bind(m.home_team_id)
    .bind(m.away_team_id)
    .bind(m.match_date)
    .bind(&m.league_shortcut)
    .bind(&m.season)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_match(pool: &SqlitePool, match_id: i64) -> Result<Match> {
    sqlx::query_as::<_, Match>(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?"))
        .bind(match_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("match {match_id}")))
}

pub async fn list_matches_for_season(pool: &SqlitePool, season: &str) -> Result<Vec<Match>> {
    let rows = sqlx::query_as::<_, Match>(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE season = ? ORDER BY matchday ASC, match_date ASC"
    ))
    .bind(season)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_matchday(
    pool: &SqlitePool,
    season: &str,
    league: &str,
    matchday: i64,
) -> Result<Vec<Match>> {
    let rows = sqlx::query_as::<_, Match>(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches \
         WHERE season = ? AND league_shortcut = ? AND matchday = ? \
         ORDER BY match_date ASC"
    ))
    .bind(season)
    .bind(league)
    .bind(matchday)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn available_matchdays(pool: &SqlitePool, season: &str) -> Result<Vec<i64>> {
    let days = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT matchday FROM matches WHERE season = ? ORDER BY matchday ASC",
    )
    .bind(season)
    .fetch_all(pool)
    .await?;
    Ok(days)
}

/// The round of the earliest unfinished fixture in a division.
pub async fn current_open_matchday(
    pool: &SqlitePool,
    league: &str,
    season: &str,
) -> Result<Option<i64>> {
    let day = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT matchday FROM matches
        WHERE league_shortcut = ? AND season = ? AND is_finished = 0
        ORDER BY match_date ASC
        LIMIT 1
        "#,
    )
    .bind(league)
    .bind(season)
    .fetch_optional(pool)
    .await?;
    Ok(day)
}

/// Highest round that has at least one finished fixture.
pub async fn latest_finished_matchday(pool: &SqlitePool, season: &str) -> Result<Option<i64>> {
    let day = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(matchday) FROM matches WHERE season = ? AND is_finished = 1",
    )
    .bind(season)
    .fetch_one(pool)
    .await?;
    Ok(day)
}

/// Round of the next unfinished fixture that has not kicked off yet.
pub async fn next_upcoming_matchday(
    pool: &SqlitePool,
    season: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let day = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT matchday FROM matches
        WHERE season = ? AND is_finished = 0 AND match_date >= ?
        ORDER BY match_date ASC
        LIMIT 1
        "#,
    )
    .bind(season)
    .bind(now)
    .fetch_optional(pool)
    .await?;
    Ok(day)
}

/// Fixtures of one round joined with both teams' names and provider ids.
pub async fn fixtures_for_import(
    pool: &SqlitePool,
    league: &str,
    season: &str,
    matchday: i64,
) -> Result<Vec<ImportFixture>> {
    let rows = sqlx::query_as::<_, ImportFixture>(
        r#"
        SELECT m.id, m.matchday, m.is_finished, m.home_goals, m.away_goals,
               h.name AS home_name, h.short_name AS home_short_name,
               h.openliga_api_id AS home_openliga_id, h.odds_api_id AS home_odds_id,
               a.name AS away_name, a.short_name AS away_short_name,
               a.openliga_api_id AS away_openliga_id, a.odds_api_id AS away_odds_id
        FROM matches m
        JOIN teams h ON h.id = m.home_team_id
        JOIN teams a ON a.id = m.away_team_id
        WHERE m.league_shortcut = ? AND m.season = ? AND m.matchday = ?
        ORDER BY m.match_date ASC
        "#,
    )
    .bind(league)
    .bind(season)
    .bind(matchday)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Stores goals and the finished flag; the result code is derived when finished.
pub async fn update_match_result(
    pool: &SqlitePool,
    match_id: i64,
    home_goals: i64,
    away_goals: i64,
    is_finished: bool,
) -> Result<()> {
    let result = is_finished.then(|| MatchResult::from_goals(home_goals, away_goals).as_code());
    sqlx::query(
        "UPDATE matches SET home_goals = ?, away_goals = ?, is_finished = ?, result = ? WHERE id = ?",
    )
    .bind(home_goals)
    .bind(away_goals)
    .bind(is_finished)
    .bind(result)
    .bind(match_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_match_draw_odds(pool: &SqlitePool, match_id: i64, odds_x: f64) -> Result<()> {
    sqlx::query("UPDATE matches SET odds_x = ? WHERE id = ?")
        .bind(odds_x)
        .bind(match_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Team stakes
// ---------------------------------------------------------------------------

pub async fn stakes_for_matchday(
    pool: &SqlitePool,
    season: &str,
    matchday: i64,
) -> Result<Vec<TeamStake>> {
    let rows = sqlx::query_as::<_, TeamStake>(
        "SELECT team_id, matchday, season, stake FROM team_stakes WHERE season = ? AND matchday = ?",
    )
    .bind(season)
    .bind(matchday)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn stakes_for_season(pool: &SqlitePool, season: &str) -> Result<Vec<TeamStake>> {
    let rows = sqlx::query_as::<_, TeamStake>(
        "SELECT team_id, matchday, season, stake FROM team_stakes WHERE season = ?",
    )
    .bind(season)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn upsert_team_stake(
    pool: &SqlitePool,
    team_id: i64,
    matchday: i64,
    season: &str,
    stake: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO team_stakes (team_id, matchday, season, stake)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(team_id, matchday, season) DO UPDATE SET stake = excluded.stake
        "#,
    )
    .bind(team_id)
    .bind(matchday)
    .bind(season)
    .bind(stake)
    .execute(pool)
    .await?;
    Ok(())
}

/// Overwrites an existing stake row; a missing row is reported, not created.
pub async fn set_team_stake(
    pool: &SqlitePool,
    team_id: i64,
    matchday: i64,
    season: &str,
    stake: f64,
) -> Result<()> {
    let res = sqlx::query(
        "UPDATE team_stakes SET stake = ? WHERE team_id = ? AND matchday = ? AND season = ?",
    )
    .bind(stake)
    .bind(team_id)
    .bind(matchday)
    .bind(season)
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "stake for team {team_id} on matchday {matchday}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

pub async fn get_bet(pool: &SqlitePool, match_id: i64) -> Result<Option<Bet>> {
    let bet = sqlx::query_as::<_, Bet>(&format!("SELECT {BET_COLUMNS} FROM bets WHERE match_id = ?"))
        .bind(match_id)
        .fetch_optional(pool)
        .await?;
    Ok(bet)
}

pub async fn bets_for_matchday(pool: &SqlitePool, season: &str, matchday: i64) -> Result<Vec<Bet>> {
    let rows = sqlx::query_as::<_, Bet>(&format!(
        "SELECT {BET_COLUMNS} FROM bets WHERE season = ? AND matchday = ?"
    ))
    .bind(season)
    .bind(matchday)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn bets_for_season(pool: &SqlitePool, season: &str) -> Result<Vec<Bet>> {
    let rows = sqlx::query_as::<_, Bet>(&format!("SELECT {BET_COLUMNS} FROM bets WHERE season = ?"))
        .bind(season)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// One bet per match: a second call replaces odds and the stake snapshot
/// but keeps abort flags and settlement fields.
pub async fn upsert_bet(
    pool: &SqlitePool,
    match_id: i64,
    matchday: i64,
    season: &str,
    odds: f64,
    home_stake: f64,
    away_stake: f64,
) -> Result<()> {
    let total_stake = home_stake + away_stake;
    sqlx::query(
        r#"
        INSERT INTO bets (match_id, matchday, season, odds, home_stake, away_stake, total_stake)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(match_id) DO UPDATE SET
            matchday = excluded.matchday,
            season = excluded.season,
            odds = excluded.odds,
            home_stake = excluded.home_stake,
            away_stake = excluded.away_stake,
            total_stake = excluded.total_stake
        "#,
    )
    .bind(match_id)
    .bind(matchday)
    .bind(season)
    .bind(odds)
    .bind(home_stake)
    .bind(away_stake)
    .bind(total_stake)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_abort_flag(pool: &SqlitePool, match_id: i64, side: Side) -> Result<()> {
    let sql = match side {
        Side::Home => "UPDATE bets SET home_team_abort = 1 WHERE match_id = ?",
        Side::Away => "UPDATE bets SET away_team_abort = 1 WHERE match_id = ?",
    };
    let res = sqlx::query(sql).bind(match_id).execute(pool).await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("bet for match {match_id}")));
    }
    Ok(())
}

pub async fn settle_bet(
    pool: &SqlitePool,
    match_id: i64,
    payout_home: f64,
    payout_away: f64,
) -> Result<()> {
    sqlx::query(
        "UPDATE bets SET payout_home = ?, payout_away = ?, is_evaluated = 1 WHERE match_id = ?",
    )
    .bind(payout_home)
    .bind(payout_away)
    .bind(match_id)
    .execute(pool)
    .await?;
    Ok(())
}
