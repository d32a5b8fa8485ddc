//! Row types for the four tables in `migrations/`.
//! Used by sqlx for typed queries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{MatchResult, Side};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    pub league_shortcut: String,
    pub games_to_wait_after_draw: i64,
    pub openliga_api_id: Option<String>,
    pub odds_api_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Match {
    pub id: i64,
    pub matchday: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub match_date: DateTime<Utc>,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
    pub is_finished: bool,
    pub result: Option<String>,
    pub league_shortcut: String,
    pub season: String,
    pub odds_x: Option<f64>,
}

impl Match {
    /// Parsed result; `None` until the fixture is finished.
    pub fn outcome(&self) -> Option<MatchResult> {
        if !self.is_finished {
            return None;
        }
        self.result.as_deref().and_then(MatchResult::from_code)
    }

    pub fn side_of(&self, team_id: i64) -> Option<Side> {
        if self.home_team_id == team_id {
            Some(Side::Home)
        } else if self.away_team_id == team_id {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn team_on(&self, side: Side) -> i64 {
        match side {
            Side::Home => self.home_team_id,
            Side::Away => self.away_team_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamStake {
    pub team_id: i64,
    pub matchday: i64,
    pub season: String,
    pub stake: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Bet {
    pub id: i64,
    pub match_id: i64,
    pub matchday: i64,
    pub season: String,
    pub odds: f64,
    pub home_stake: f64,
    pub away_stake: f64,
    pub total_stake: f64,
    pub payout_home: Option<f64>,
    pub payout_away: Option<f64>,
    pub home_team_abort: bool,
    pub away_team_abort: bool,
    pub is_evaluated: bool,
}

impl Bet {
    pub fn stake_on(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.home_stake,
            Side::Away => self.away_stake,
        }
    }

    pub fn payout_on(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.payout_home.unwrap_or(0.0),
            Side::Away => self.payout_away.unwrap_or(0.0),
        }
    }

    pub fn aborted(&self, side: Side) -> bool {
        match side {
            Side::Home => self.home_team_abort,
            Side::Away => self.away_team_abort,
        }
    }
}

/// A fixture of the current round joined with both teams' matching keys.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImportFixture {
    pub id: i64,
    pub matchday: i64,
    pub is_finished: bool,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
    pub home_name: String,
    pub home_short_name: String,
    pub home_openliga_id: Option<String>,
    pub home_odds_id: Option<String>,
    pub away_name: String,
    pub away_short_name: String,
    pub away_openliga_id: Option<String>,
    pub away_odds_id: Option<String>,
}

/// Input row for seeding a team.
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    pub league_shortcut: String,
    pub games_to_wait_after_draw: i64,
    pub openliga_api_id: Option<String>,
    pub odds_api_id: Option<String>,
}

/// Input row for seeding a fixture.
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub id: i64,
    pub matchday: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub match_date: DateTime<Utc>,
    pub league_shortcut: String,
    pub season: String,
}
