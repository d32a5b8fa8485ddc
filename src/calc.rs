//! Stake and odds arithmetic used by the betting sheet and the statistics views.
//! Everything here is pure and total over its inputs.

use serde::Serialize;

use crate::config::STAKE_ALERT_THRESHOLD;
use crate::db::models::Match;
use crate::error::{AppError, Result};
use crate::types::MatchResult;

/// Highest decimal price accepted from user input.
const MAX_ODDS: f64 = 1000.0;

/// A validated decimal price: finite and within [1.0, 1000.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Odds(f64);

impl Odds {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 1.0 || value > MAX_ODDS {
            return Err(AppError::Validation(format!(
                "odds must be a decimal price between 1.00 and {MAX_ODDS:.0}, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Rejects negative, NaN and infinite stake amounts.
pub fn validate_stake(value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::Validation(format!(
            "stake must be a non-negative amount, got {value}"
        )));
    }
    Ok(value)
}

/// Reduced total that pays the same as `total_stake` would at odds 3.00.
pub fn alternative_stake(total_stake: f64, odds: Odds) -> f64 {
    (total_stake * 3.0) / odds.value()
}

/// True when either side's stake is over the alert threshold.
pub fn needs_stake_adjustment(home_stake: f64, away_stake: f64) -> bool {
    home_stake > STAKE_ALERT_THRESHOLD || away_stake > STAKE_ALERT_THRESHOLD
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StakeSummary {
    pub total_stake: f64,
    pub avg_stake: f64,
    pub max_stake: f64,
}

pub fn aggregate_stats<I>(total_stakes: I) -> StakeSummary
where
    I: IntoIterator<Item = f64>,
{
    let mut count = 0usize;
    let mut total = 0.0;
    let mut max: Option<f64> = None;
    for stake in total_stakes {
        count += 1;
        total += stake;
        max = Some(max.map_or(stake, |m: f64| m.max(stake)));
    }

    StakeSummary {
        total_stake: total,
        avg_stake: if count == 0 { 0.0 } else { total / count as f64 },
        max_stake: max.unwrap_or(0.0),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DrawStats {
    pub draw_count: usize,
    pub total_matches: usize,
    pub draw_percentage: f64,
}

/// Draw rate of one team over the finished fixtures it took part in.
pub fn team_draw_stats(team_id: i64, matches: &[Match]) -> DrawStats {
    let played: Vec<&Match> = matches
        .iter()
        .filter(|m| m.is_finished && m.side_of(team_id).is_some())
        .collect();
    let draw_count = played
        .iter()
        .filter(|m| m.outcome() == Some(MatchResult::Draw))
        .count();
    let total_matches = played.len();

    DrawStats {
        draw_count,
        total_matches,
        draw_percentage: if total_matches == 0 {
            0.0
        } else {
            draw_count as f64 / total_matches as f64 * 100.0
        },
    }
}

pub fn profit(total_payout: f64, total_stake: f64) -> f64 {
    total_payout - total_stake
}

/// Payouts `(home, away)` for a settled bet: a draw pays each side's stake times the odds.
pub fn settlement_payouts(result: MatchResult, odds: f64, home_stake: f64, away_stake: f64) -> (f64, f64) {
    if result.is_draw() {
        (home_stake * odds, away_stake * odds)
    } else {
        (0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn finished(id: i64, home: i64, away: i64, result: &str) -> Match {
        Match {
            id,
            matchday: id,
            home_team_id: home,
            away_team_id: away,
            match_date: Utc::now(),
            home_goals: Some(0),
            away_goals: Some(0),
            is_finished: true,
            result: Some(result.to_string()),
            league_shortcut: "bl1".to_string(),
            season: "2025".to_string(),
            odds_x: None,
        }
    }

    #[test]
    fn alternative_stake_examples() {
        let three = Odds::new(3.0).unwrap();
        assert!((alternative_stake(300.0, three) - 300.0).abs() < 1e-9);

        let five = Odds::new(5.0).unwrap();
        assert!((alternative_stake(300.0, five) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn zero_and_nonsense_odds_are_rejected() {
        for bad in [0.0, -2.0, 0.99, f64::NAN, f64::INFINITY, 1000.5] {
            assert!(matches!(Odds::new(bad), Err(AppError::Validation(_))), "{bad}");
        }
        assert!(Odds::new(1.0).is_ok());
        assert!(Odds::new(1000.0).is_ok());
    }

    #[test]
    fn threshold_is_strictly_greater_than_250() {
        assert!(needs_stake_adjustment(260.0, 40.0));
        assert!(needs_stake_adjustment(0.0, 250.5));
        assert!(!needs_stake_adjustment(250.0, 250.0));
    }

    #[test]
    fn empty_aggregate_is_all_zero() {
        assert_eq!(aggregate_stats(Vec::new()), StakeSummary::default());
    }

    #[test]
    fn aggregate_total_ignores_order() {
        let a = aggregate_stats([12.0, 3.5, 64.0, 0.5]);
        let b = aggregate_stats([0.5, 64.0, 12.0, 3.5]);
        assert_eq!(a.total_stake, 80.0);
        assert_eq!(a.total_stake, b.total_stake);
        assert_eq!(a.max_stake, 64.0);
        assert_eq!(a.avg_stake, 20.0);
    }

    #[test]
    fn one_draw_in_three() {
        let matches = vec![
            finished(1, 7, 8, "x"),
            finished(2, 9, 7, "1"),
            finished(3, 7, 10, "2"),
            finished(4, 11, 12, "x"),
        ];
        let stats = team_draw_stats(7, &matches);
        assert_eq!(stats.draw_count, 1);
        assert_eq!(stats.total_matches, 3);
        assert!((stats.draw_percentage - 33.333).abs() < 0.01);
    }

    #[test]
    fn draw_stats_without_games() {
        let stats = team_draw_stats(7, &[]);
        assert_eq!(stats, DrawStats::default());
    }

    #[test]
    fn unfinished_games_do_not_count() {
        let mut live = finished(1, 7, 8, "x");
        live.is_finished = false;
        let stats = team_draw_stats(7, &[live]);
        assert_eq!(stats.total_matches, 0);
    }

    #[test]
    fn settlement_pays_only_on_draw() {
        assert_eq!(settlement_payouts(MatchResult::Draw, 3.0, 4.0, 2.0), (12.0, 6.0));
        assert_eq!(settlement_payouts(MatchResult::HomeWin, 3.0, 4.0, 2.0), (0.0, 0.0));
        assert_eq!(profit(18.0, 6.0), 12.0);
    }

    #[test]
    fn negative_stake_rejected() {
        assert!(validate_stake(-0.01).is_err());
        assert_eq!(validate_stake(0.0).unwrap(), 0.0);
    }
}
