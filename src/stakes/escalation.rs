use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::calc::settlement_payouts;
use crate::db::models::{Bet, Match};
use crate::db::store;
use crate::error::Result;
use crate::stakes::policy::{replay_from_last_draw, team_rounds, StakePolicy};

#[derive(Debug, Default, Serialize)]
pub struct StakeRunSummary {
    pub league: String,
    pub season: String,
    pub bets_settled: usize,
    pub stakes_written: usize,
}

/// Settle the round's bets, then write every team's stake for `matchday + 1`.
pub async fn calculate_stakes_after_matchday<P: StakePolicy + ?Sized>(
    pool: &SqlitePool,
    policy: &P,
    matchday: i64,
    league: &str,
    season: &str,
) -> Result<StakeRunSummary> {
    let mut summary = StakeRunSummary {
        league: league.to_string(),
        season: season.to_string(),
        ..Default::default()
    };

    let matches = league_matches(pool, league, season).await?;
    let mut bets = bets_by_match(pool, season).await?;
    summary.bets_settled = settle_round(pool, &matches, &mut bets, matchday).await?;

    let teams = store::list_teams_in_league(pool, league).await?;
    for team in &teams {
        let rounds = team_rounds(team, &matches, &bets, matchday);
        let replayed = replay_from_last_draw(policy, team, &rounds);
        if let Some(&(round, stake)) = replayed.last() {
            store::upsert_team_stake(pool, team.id, round, season, stake).await?;
            summary.stakes_written += 1;
            debug!(team_id = team.id, round, stake, "next stake for {}", team.short_name);
        }
    }

    info!(
        league,
        matchday,
        settled = summary.bets_settled,
        written = summary.stakes_written,
        "Stakes calculated after matchday {matchday}: {} bets settled, {} stakes written",
        summary.bets_settled,
        summary.stakes_written,
    );
    Ok(summary)
}

/// Replay each team from its most recent draw and rewrite every stake after
/// it, up to the first round without a finished fixture. Running it again on
/// unchanged data writes identical values.
pub async fn recalculate_all_stakes_from_last_draw<P: StakePolicy + ?Sized>(
    pool: &SqlitePool,
    policy: &P,
    league: &str,
    season: &str,
) -> Result<StakeRunSummary> {
    let mut summary = StakeRunSummary {
        league: league.to_string(),
        season: season.to_string(),
        ..Default::default()
    };

    let matches = league_matches(pool, league, season).await?;
    let mut bets = bets_by_match(pool, season).await?;
    let through = matches
        .iter()
        .filter(|m| m.is_finished)
        .map(|m| m.matchday)
        .max()
        .unwrap_or(0);

    for round in 1..=through {
        summary.bets_settled += settle_round(pool, &matches, &mut bets, round).await?;
    }

    let teams = store::list_teams_in_league(pool, league).await?;
    for team in &teams {
        let rounds = team_rounds(team, &matches, &bets, through);
        for (round, stake) in replay_from_last_draw(policy, team, &rounds) {
            store::upsert_team_stake(pool, team.id, round, season, stake).await?;
            summary.stakes_written += 1;
        }
    }

    info!(
        league,
        through,
        settled = summary.bets_settled,
        written = summary.stakes_written,
        "Stakes recalculated from last draw through matchday {through}: {} stakes written",
        summary.stakes_written,
    );
    Ok(summary)
}

async fn league_matches(pool: &SqlitePool, league: &str, season: &str) -> Result<Vec<Match>> {
    Ok(store::list_matches_for_season(pool, season)
        .await?
        .into_iter()
        .filter(|m| m.league_shortcut == league)
        .collect())
}

async fn bets_by_match(pool: &SqlitePool, season: &str) -> Result<HashMap<i64, Bet>> {
    Ok(store::bets_for_season(pool, season)
        .await?
        .into_iter()
        .map(|b| (b.match_id, b))
        .collect())
}

/// Fill in payouts for finished, not yet evaluated bets of one round.
async fn settle_round(
    pool: &SqlitePool,
    matches: &[Match],
    bets: &mut HashMap<i64, Bet>,
    matchday: i64,
) -> Result<usize> {
    let mut settled = 0;
    for m in matches.iter().filter(|m| m.matchday == matchday) {
        let Some(result) = m.outcome() else { continue };
        let Some(bet) = bets.get_mut(&m.id) else { continue };
        if bet.is_evaluated {
            continue;
        }
        let (home, away) = settlement_payouts(result, bet.odds, bet.home_stake, bet.away_stake);
        store::settle_bet(pool, m.id, home, away).await?;
        bet.payout_home = Some(home);
        bet.payout_away = Some(away);
        bet.is_evaluated = true;
        settled += 1;
    }
    Ok(settled)
}
