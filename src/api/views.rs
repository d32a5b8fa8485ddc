//! Response models for the dashboard screens, built from already-loaded rows.
//! Nothing here touches the database.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calc::{
    aggregate_stats, alternative_stake, needs_stake_adjustment, profit, team_draw_stats, DrawStats, Odds,
    StakeSummary,
};
use crate::config::{LeagueConfig, STAKE_ALERT_THRESHOLD};
use crate::db::models::{Bet, Match, Team, TeamStake};
use crate::types::{MatchResult, Side, TeamOutcome};

/// Stake lookup by `(team_id, matchday)` that falls back to the configured floor.
pub struct StakeBook {
    stakes: HashMap<(i64, i64), f64>,
    floor: f64,
}

impl StakeBook {
    pub fn new(rows: &[TeamStake], floor: f64) -> Self {
        Self {
            stakes: rows.iter().map(|s| ((s.team_id, s.matchday), s.stake)).collect(),
            floor,
        }
    }

    pub fn stake(&self, team_id: i64, matchday: i64) -> f64 {
        self.stakes.get(&(team_id, matchday)).copied().unwrap_or(self.floor)
    }

    /// `(home, away)` stakes of a fixture on its own matchday.
    pub fn for_match(&self, m: &Match) -> (f64, f64) {
        (
            self.stake(m.home_team_id, m.matchday),
            self.stake(m.away_team_id, m.matchday),
        )
    }
}

/// The odds to quote for a fixture: the accepted bet price, else the imported draw price.
fn quoted_odds(m: &Match, bet: Option<&Bet>) -> Option<Odds> {
    bet.map(|b| b.odds)
        .or(m.odds_x)
        .and_then(|o| Odds::new(o).ok())
}

/// Reduced total proposed when a side is over the alert threshold.
pub fn proposal(home_stake: f64, away_stake: f64, odds: Option<Odds>) -> Option<f64> {
    if !needs_stake_adjustment(home_stake, away_stake) {
        return None;
    }
    odds.map(|o| alternative_stake(home_stake + away_stake, o))
}

fn short_name(teams: &HashMap<i64, &Team>, id: i64) -> String {
    teams
        .get(&id)
        .map(|t| t.short_name.clone())
        .unwrap_or_else(|| format!("#{id}"))
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct SeasonTotals {
    /// Stakes of settled bets; this is what `profit` is measured against.
    pub total_stake: f64,
    /// Stakes of bets whose match is not settled yet.
    pub open_stake: f64,
    pub total_payout: f64,
    pub profit: f64,
    pub evaluated_bets: usize,
    pub open_bets: usize,
}

pub fn season_totals(bets: &[Bet]) -> SeasonTotals {
    let mut totals = SeasonTotals::default();
    for bet in bets {
        if bet.is_evaluated {
            totals.evaluated_bets += 1;
            totals.total_stake += bet.total_stake;
            totals.total_payout += bet.payout_on(Side::Home) + bet.payout_on(Side::Away);
        } else {
            totals.open_bets += 1;
            totals.open_stake += bet.total_stake;
        }
    }
    totals.profit = profit(totals.total_payout, totals.total_stake);
    totals
}

#[derive(Debug, Serialize)]
pub struct FixtureView {
    pub match_id: i64,
    pub match_date: DateTime<Utc>,
    pub home: String,
    pub away: String,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
    pub is_finished: bool,
    pub result: Option<MatchResult>,
    pub odds_x: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct LeagueFixtures {
    pub league: String,
    pub name: String,
    pub fixtures: Vec<FixtureView>,
}

#[derive(Debug, Serialize)]
pub struct Overview {
    pub matchday: Option<i64>,
    pub totals: SeasonTotals,
    pub leagues: Vec<LeagueFixtures>,
}

pub fn overview(
    leagues: &[LeagueConfig],
    matchday: Option<i64>,
    teams: &[Team],
    matches: &[Match],
    bets: &[Bet],
) -> Overview {
    let by_id: HashMap<i64, &Team> = teams.iter().map(|t| (t.id, t)).collect();
    let leagues = leagues
        .iter()
        .map(|league| LeagueFixtures {
            league: league.shortcut.clone(),
            name: league.name.clone(),
            fixtures: matches
                .iter()
                .filter(|m| m.league_shortcut == league.shortcut && Some(m.matchday) == matchday)
                .map(|m| FixtureView {
                    match_id: m.id,
                    match_date: m.match_date,
                    home: short_name(&by_id, m.home_team_id),
                    away: short_name(&by_id, m.away_team_id),
                    home_goals: m.home_goals,
                    away_goals: m.away_goals,
                    is_finished: m.is_finished,
                    result: m.outcome(),
                    odds_x: m.odds_x,
                })
                .collect(),
        })
        .collect();

    Overview {
        matchday,
        totals: season_totals(bets),
        leagues,
    }
}

// ---------------------------------------------------------------------------
// Team table
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct TeamRow {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    pub games_to_wait_after_draw: i64,
    pub draws: DrawStats,
}

#[derive(Debug, Serialize)]
pub struct LeagueTeams {
    pub league: String,
    pub name: String,
    pub teams: Vec<TeamRow>,
}

pub fn team_table(leagues: &[LeagueConfig], teams: &[Team], matches: &[Match]) -> Vec<LeagueTeams> {
    leagues
        .iter()
        .map(|league| LeagueTeams {
            league: league.shortcut.clone(),
            name: league.name.clone(),
            teams: teams
                .iter()
                .filter(|t| t.league_shortcut == league.shortcut)
                .map(|t| TeamRow {
                    id: t.id,
                    name: t.name.clone(),
                    short_name: t.short_name.clone(),
                    games_to_wait_after_draw: t.games_to_wait_after_draw,
                    draws: team_draw_stats(t.id, matches),
                })
                .collect(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Betting sheet
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SheetSide {
    pub team_id: i64,
    pub short_name: String,
    pub stake: f64,
    pub over_threshold: bool,
    pub aborted: bool,
}

#[derive(Debug, Serialize)]
pub struct SheetRow {
    pub match_id: i64,
    pub match_date: DateTime<Utc>,
    pub is_finished: bool,
    pub home: SheetSide,
    pub away: SheetSide,
    pub total_stake: f64,
    /// Imported bookmaker draw price.
    pub odds_x: Option<f64>,
    /// Price accepted when the bet was saved.
    pub bet_odds: Option<f64>,
    pub bet_total_stake: Option<f64>,
    pub alternative_stake: Option<f64>,
    /// Return on a draw at the quoted odds.
    pub potential_payout: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SheetLeague {
    pub league: String,
    pub name: String,
    pub rows: Vec<SheetRow>,
    pub summary: StakeSummary,
}

#[derive(Debug, Serialize)]
pub struct BettingSheet {
    pub matchday: Option<i64>,
    pub threshold: f64,
    pub leagues: Vec<SheetLeague>,
    pub summary: StakeSummary,
}

fn sheet_row(m: &Match, teams: &HashMap<i64, &Team>, book: &StakeBook, bet: Option<&Bet>) -> SheetRow {
    let (home_stake, away_stake) = book.for_match(m);
    let total_stake = home_stake + away_stake;
    let odds = quoted_odds(m, bet);
    let side = |side: Side, stake: f64| SheetSide {
        team_id: m.team_on(side),
        short_name: short_name(teams, m.team_on(side)),
        stake,
        over_threshold: stake > STAKE_ALERT_THRESHOLD,
        aborted: bet.is_some_and(|b| b.aborted(side)),
    };

    SheetRow {
        match_id: m.id,
        match_date: m.match_date,
        is_finished: m.is_finished,
        home: side(Side::Home, home_stake),
        away: side(Side::Away, away_stake),
        total_stake,
        odds_x: m.odds_x,
        bet_odds: bet.map(|b| b.odds),
        bet_total_stake: bet.map(|b| b.total_stake),
        alternative_stake: proposal(home_stake, away_stake, odds),
        potential_payout: odds.map(|o| total_stake * o.value()),
    }
}

/// Rows for every fixture of `matchday` in `matches`, grouped by division.
pub fn betting_sheet(
    leagues: &[LeagueConfig],
    matchday: Option<i64>,
    teams: &[Team],
    matches: &[Match],
    book: &StakeBook,
    bets: &[Bet],
) -> BettingSheet {
    let by_id: HashMap<i64, &Team> = teams.iter().map(|t| (t.id, t)).collect();
    let bets: HashMap<i64, &Bet> = bets.iter().map(|b| (b.match_id, b)).collect();

    let leagues: Vec<SheetLeague> = leagues
        .iter()
        .map(|league| {
            let rows: Vec<SheetRow> = matches
                .iter()
                .filter(|m| m.league_shortcut == league.shortcut && Some(m.matchday) == matchday)
                .map(|m| sheet_row(m, &by_id, book, bets.get(&m.id).copied()))
                .collect();
            SheetLeague {
                league: league.shortcut.clone(),
                name: league.name.clone(),
                summary: aggregate_stats(rows.iter().map(|r| r.total_stake)),
                rows,
            }
        })
        .collect();

    let summary = aggregate_stats(leagues.iter().flat_map(|l| l.rows.iter().map(|r| r.total_stake)));
    BettingSheet {
        matchday,
        threshold: STAKE_ALERT_THRESHOLD,
        leagues,
        summary,
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, PartialEq)]
pub struct StatCell {
    pub matchday: i64,
    /// `None` when the team had no fixture on this matchday.
    pub stake: Option<f64>,
    /// `None` until the fixture is finished.
    pub outcome: Option<TeamOutcome>,
}

#[derive(Debug, Serialize)]
pub struct TeamStatistics {
    pub team_id: i64,
    pub short_name: String,
    pub cells: Vec<StatCell>,
    pub draws: DrawStats,
    /// Stakes over finished rounds only.
    pub total_stake: f64,
    pub total_payout: f64,
    pub profit: f64,
}

#[derive(Debug, Serialize)]
pub struct LeagueStatistics {
    pub league: String,
    pub name: String,
    pub matchdays: Vec<i64>,
    pub teams: Vec<TeamStatistics>,
}

fn team_statistics(
    team: &Team,
    matchdays: &[i64],
    matches: &[Match],
    book: &StakeBook,
    bets: &HashMap<i64, &Bet>,
) -> TeamStatistics {
    let by_round: HashMap<i64, (&Match, Side)> = matches
        .iter()
        .filter_map(|m| m.side_of(team.id).map(|side| (m.matchday, (m, side))))
        .collect();

    let mut total_stake = 0.0;
    let mut total_payout = 0.0;
    let cells = matchdays
        .iter()
        .map(|&matchday| {
            let Some(&(m, side)) = by_round.get(&matchday) else {
                return StatCell { matchday, stake: None, outcome: None };
            };
            let bet = bets.get(&m.id).copied();
            let stake = bet.map_or_else(|| book.stake(team.id, matchday), |b| b.stake_on(side));
            let outcome = m.outcome().map(|r| TeamOutcome::for_side(r, side));
            if outcome.is_some() {
                total_stake += stake;
            }
            if let Some(b) = bet.filter(|b| b.is_evaluated) {
                total_payout += b.payout_on(side);
            }
            StatCell { matchday, stake: Some(stake), outcome }
        })
        .collect();

    TeamStatistics {
        team_id: team.id,
        short_name: team.short_name.clone(),
        cells,
        draws: team_draw_stats(team.id, matches),
        total_stake,
        total_payout,
        profit: profit(total_payout, total_stake),
    }
}

pub fn statistics(
    leagues: &[LeagueConfig],
    teams: &[Team],
    matches: &[Match],
    book: &StakeBook,
    bets: &[Bet],
) -> Vec<LeagueStatistics> {
    let bets: HashMap<i64, &Bet> = bets.iter().map(|b| (b.match_id, b)).collect();
    leagues
        .iter()
        .map(|league| {
            let league_matches: Vec<Match> = matches
                .iter()
                .filter(|m| m.league_shortcut == league.shortcut)
                .cloned()
                .collect();
            let matchdays: Vec<i64> = league_matches
                .iter()
                .map(|m| m.matchday)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            LeagueStatistics {
                league: league.shortcut.clone(),
                name: league.name.clone(),
                teams: teams
                    .iter()
                    .filter(|t| t.league_shortcut == league.shortcut)
                    .map(|t| team_statistics(t, &matchdays, &league_matches, book, &bets))
                    .collect(),
                matchdays,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn team(id: i64, short: &str) -> Team {
        Team {
            id,
            name: format!("{short} FC"),
            short_name: short.to_string(),
            league_shortcut: "bl1".to_string(),
            games_to_wait_after_draw: 0,
            openliga_api_id: None,
            odds_api_id: None,
        }
    }

    fn game(id: i64, matchday: i64, home: i64, away: i64, result: Option<&str>) -> Match {
        Match {
            id,
            matchday,
            home_team_id: home,
            away_team_id: away,
            match_date: Utc.with_ymd_and_hms(2025, 9, 1, 15, 30, 0).unwrap(),
            home_goals: result.map(|_| 1),
            away_goals: result.map(|_| 1),
            is_finished: result.is_some(),
            result: result.map(str::to_string),
            league_shortcut: "bl1".to_string(),
            season: "2025".to_string(),
            odds_x: None,
        }
    }

    fn bet(match_id: i64, matchday: i64, odds: f64, home: f64, away: f64) -> Bet {
        Bet {
            id: match_id,
            match_id,
            matchday,
            season: "2025".to_string(),
            odds,
            home_stake: home,
            away_stake: away,
            total_stake: home + away,
            payout_home: None,
            payout_away: None,
            home_team_abort: false,
            away_team_abort: false,
            is_evaluated: false,
        }
    }

    fn stake(team_id: i64, matchday: i64, stake: f64) -> TeamStake {
        TeamStake { team_id, matchday, season: "2025".to_string(), stake }
    }

    #[test]
    fn missing_stake_uses_floor() {
        let book = StakeBook::new(&[stake(1, 3, 8.0)], 0.5);
        assert_eq!(book.stake(1, 3), 8.0);
        assert_eq!(book.stake(1, 4), 0.5);
    }

    #[test]
    fn sheet_proposes_alternative_over_threshold() {
        let teams = [team(1, "Bayern"), team(2, "BVB")];
        let mut m = game(10, 5, 1, 2, None);
        m.odds_x = Some(5.0);
        let book = StakeBook::new(&[stake(1, 5, 260.0), stake(2, 5, 40.0)], 0.0);

        let sheet = betting_sheet(&LeagueConfig::defaults(), Some(5), &teams, &[m], &book, &[]);
        let row = &sheet.leagues[0].rows[0];
        assert!(row.home.over_threshold);
        assert_eq!(row.total_stake, 300.0);
        assert_eq!(row.alternative_stake, Some(180.0));
        assert_eq!(row.potential_payout, Some(1500.0));
        assert_eq!(sheet.summary.total_stake, 300.0);
        assert!(sheet.leagues[1].rows.is_empty());
    }

    #[test]
    fn accepted_odds_win_over_imported_price() {
        let teams = [team(1, "Bayern"), team(2, "BVB")];
        let mut m = game(10, 5, 1, 2, None);
        m.odds_x = Some(5.0);
        let book = StakeBook::new(&[stake(1, 5, 300.0)], 0.0);
        let bets = [bet(10, 5, 3.0, 300.0, 0.0)];

        let sheet = betting_sheet(&LeagueConfig::defaults(), Some(5), &teams, &[m], &book, &bets);
        let row = &sheet.leagues[0].rows[0];
        assert_eq!(row.bet_odds, Some(3.0));
        assert_eq!(row.alternative_stake, Some(300.0));
    }

    #[test]
    fn no_proposal_below_threshold() {
        assert_eq!(proposal(250.0, 10.0, Odds::new(3.0).ok()), None);
        assert_eq!(proposal(251.0, 10.0, None), None);
    }

    #[test]
    fn open_bets_stay_out_of_profit() {
        let mut settled = bet(1, 1, 3.0, 2.0, 4.0);
        settled.is_evaluated = true;
        settled.payout_home = Some(6.0);
        settled.payout_away = Some(12.0);
        let open = bet(2, 2, 3.2, 1.0, 1.0);

        let totals = season_totals(&[settled, open]);
        assert_eq!(totals.total_stake, 6.0);
        assert_eq!(totals.open_stake, 2.0);
        assert_eq!(totals.total_payout, 18.0);
        assert_eq!(totals.profit, 12.0);
        assert_eq!((totals.evaluated_bets, totals.open_bets), (1, 1));
    }

    #[test]
    fn statistics_cells_follow_the_team() {
        let teams = [team(1, "Bayern"), team(2, "BVB"), team(3, "HSV")];
        let matches = [
            game(10, 1, 1, 2, Some("x")),
            game(11, 2, 3, 1, Some("2")),
            game(12, 3, 2, 3, None),
        ];
        let book = StakeBook::new(&[stake(1, 2, 2.0)], 1.0);
        let mut drawn = bet(10, 1, 3.0, 1.0, 1.0);
        drawn.is_evaluated = true;
        drawn.payout_home = Some(3.0);
        drawn.payout_away = Some(3.0);

        let stats = statistics(&LeagueConfig::defaults(), &teams, &matches, &book, &[drawn]);
        let bayern = &stats[0].teams[0];
        assert_eq!(stats[0].matchdays, vec![1, 2, 3]);
        assert_eq!(
            bayern.cells,
            vec![
                StatCell { matchday: 1, stake: Some(1.0), outcome: Some(TeamOutcome::Draw) },
                StatCell { matchday: 2, stake: Some(2.0), outcome: Some(TeamOutcome::Won) },
                StatCell { matchday: 3, stake: None, outcome: None },
            ]
        );
        assert_eq!(bayern.total_stake, 3.0);
        assert_eq!(bayern.total_payout, 3.0);
        assert_eq!(bayern.profit, 0.0);
        assert_eq!(bayern.draws.draw_count, 1);

        // HSV's open fixture does not count towards the total
        let hsv = &stats[0].teams[2];
        assert_eq!(hsv.cells[2].stake, Some(1.0));
        assert_eq!(hsv.total_stake, 1.0);
    }
}
