use std::collections::HashMap;

use crate::db::models::{Bet, Match, Team};
use crate::types::Side;

/// Where a team stands in its escalation chain going into the next round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StakeState {
    /// Amount riskable on the team for the next round (0 while waiting).
    pub stake: f64,
    /// Played rounds left to sit out after a draw.
    pub waiting: i64,
}

impl StakeState {
    pub fn escalating(stake: f64) -> Self {
        Self { stake, waiting: 0 }
    }
}

/// Settled facts about one round, as far as the team is concerned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub draw: bool,
    /// The team's chain was manually halted on this round's bet.
    pub aborted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundRecord {
    pub matchday: i64,
    /// The team's stake in the bet snapshot, when a bet was placed.
    pub wagered: Option<f64>,
    /// `None` for a bye or a fixture that is not finished yet.
    pub settled: Option<Settlement>,
}

/// Decides the next stake of a team from its previous state and one round.
pub trait StakePolicy: Send + Sync {
    fn initial(&self, team: &Team) -> StakeState;

    /// State right after a drawn round.
    fn after_draw(&self, team: &Team) -> StakeState;

    fn after_round(&self, team: &Team, state: StakeState, round: &RoundRecord) -> StakeState;
}

/// Multiplies the wagered stake by `factor` after each lost round, resets to
/// `base_stake` on abort, and sits out `games_to_wait_after_draw` played rounds
/// after a draw before starting over at `base_stake`.
#[derive(Debug, Clone, Copy)]
pub struct EscalationPolicy {
    pub base_stake: f64,
    pub factor: f64,
}

impl StakePolicy for EscalationPolicy {
    fn initial(&self, _team: &Team) -> StakeState {
        StakeState::escalating(self.base_stake)
    }

    fn after_draw(&self, team: &Team) -> StakeState {
        let wait = team.games_to_wait_after_draw.max(0);
        if wait == 0 {
            StakeState::escalating(self.base_stake)
        } else {
            StakeState { stake: 0.0, waiting: wait }
        }
    }

    fn after_round(&self, team: &Team, state: StakeState, round: &RoundRecord) -> StakeState {
        let Some(settled) = round.settled else {
            return state;
        };
        if settled.draw {
            return self.after_draw(team);
        }
        if state.waiting > 0 {
            let waiting = state.waiting - 1;
            return if waiting == 0 {
                StakeState::escalating(self.base_stake)
            } else {
                StakeState { stake: 0.0, waiting }
            };
        }
        if settled.aborted {
            return StakeState::escalating(self.base_stake);
        }

        let played = round.wagered.unwrap_or(state.stake);
        if played <= 0.0 {
            StakeState::escalating(self.base_stake)
        } else {
            StakeState::escalating(played * self.factor)
        }
    }
}

/// Per-round records of one team for rounds `1..=through`, byes included.
/// The schema allows a team one fixture per round, so keying by matchday is lossless.
pub fn team_rounds(team: &Team, matches: &[Match], bets: &HashMap<i64, Bet>, through: i64) -> Vec<RoundRecord> {
    let by_round: HashMap<i64, (&Match, Side)> = matches
        .iter()
        .filter_map(|m| m.side_of(team.id).map(|side| (m.matchday, (m, side))))
        .collect();

    (1..=through)
        .map(|matchday| {
            let Some(&(m, side)) = by_round.get(&matchday) else {
                return RoundRecord { matchday, wagered: None, settled: None };
            };
            let bet = bets.get(&m.id);
            RoundRecord {
                matchday,
                wagered: bet.map(|b| b.stake_on(side)),
                settled: m.outcome().map(|result| Settlement {
                    draw: result.is_draw(),
                    aborted: bet.is_some_and(|b| b.aborted(side)),
                }),
            }
        })
        .collect()
}

/// Most recent round the team drew.
pub fn last_draw(rounds: &[RoundRecord]) -> Option<i64> {
    rounds
        .iter()
        .rev()
        .find(|r| r.settled.is_some_and(|s| s.draw))
        .map(|r| r.matchday)
}

/// Stakes per round, starting at `start_round` with `start` and folding every
/// round in `rounds` (ascending, all `>= start_round`). A round that already
/// has a bet keeps its wagered amount. The last entry is the round after
/// the final record.
pub fn replay<P: StakePolicy + ?Sized>(
    policy: &P,
    team: &Team,
    start_round: i64,
    start: StakeState,
    rounds: &[RoundRecord],
) -> Vec<(i64, f64)> {
    let mut state = start;
    let mut out = Vec::with_capacity(rounds.len() + 1);
    for round in rounds {
        out.push((round.matchday, round.wagered.unwrap_or(state.stake)));
        state = policy.after_round(team, state, round);
    }
    let final_round = rounds.last().map_or(start_round, |r| r.matchday + 1);
    out.push((final_round, state.stake));
    out
}

/// Replays a team from its most recent draw (or from round 1 without one).
pub fn replay_from_last_draw<P: StakePolicy + ?Sized>(
    policy: &P,
    team: &Team,
    rounds: &[RoundRecord],
) -> Vec<(i64, f64)> {
    match last_draw(rounds) {
        Some(draw_round) => {
            let after: Vec<RoundRecord> = rounds
                .iter()
                .filter(|r| r.matchday > draw_round)
                .copied()
                .collect();
            replay(policy, team, draw_round + 1, policy.after_draw(team), &after)
        }
        None => replay(policy, team, 1, policy.initial(team), rounds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: EscalationPolicy = EscalationPolicy { base_stake: 1.0, factor: 2.0 };

    fn team(wait: i64) -> Team {
        Team {
            id: 1,
            name: "Werder Bremen".to_string(),
            short_name: "Bremen".to_string(),
            league_shortcut: "bl1".to_string(),
            games_to_wait_after_draw: wait,
            openliga_api_id: None,
            odds_api_id: None,
        }
    }

    fn lost(matchday: i64) -> RoundRecord {
        RoundRecord {
            matchday,
            wagered: None,
            settled: Some(Settlement { draw: false, aborted: false }),
        }
    }

    fn drawn(matchday: i64) -> RoundRecord {
        RoundRecord {
            matchday,
            wagered: None,
            settled: Some(Settlement { draw: true, aborted: false }),
        }
    }

    fn stakes(out: &[(i64, f64)]) -> Vec<f64> {
        out.iter().map(|(_, s)| *s).collect()
    }

    #[test]
    fn losses_double_from_base() {
        let rounds: Vec<_> = (1..=8).map(lost).collect();
        let out = replay_from_last_draw(&POLICY, &team(0), &rounds);
        assert_eq!(out.first(), Some(&(1, 1.0)));
        assert_eq!(out.last(), Some(&(9, 256.0)));
    }

    #[test]
    fn draw_resets_and_waits() {
        let rounds = vec![lost(1), lost(2), drawn(3), lost(4), lost(5), lost(6)];
        let out = replay_from_last_draw(&POLICY, &team(2), &rounds);
        // round 4 and 5 sit out, chain restarts on 6
        assert_eq!(out, vec![(4, 0.0), (5, 0.0), (6, 1.0), (7, 2.0)]);
    }

    #[test]
    fn draw_without_wait_restarts_immediately() {
        let rounds = vec![lost(1), drawn(2), lost(3)];
        let out = replay_from_last_draw(&POLICY, &team(0), &rounds);
        assert_eq!(stakes(&out), vec![1.0, 2.0]);
    }

    #[test]
    fn open_rounds_and_byes_carry_the_stake() {
        let bye = RoundRecord { matchday: 2, wagered: None, settled: None };
        let rounds = vec![lost(1), bye, lost(3)];
        let out = replay(&POLICY, &team(0), 1, POLICY.initial(&team(0)), &rounds);
        assert_eq!(stakes(&out), vec![1.0, 2.0, 2.0, 4.0]);
    }

    #[test]
    fn wagered_amount_drives_the_next_stake() {
        let mut reduced = lost(2);
        reduced.wagered = Some(3.0);
        let rounds = vec![lost(1), reduced];
        let out = replay(&POLICY, &team(0), 1, POLICY.initial(&team(0)), &rounds);
        assert_eq!(out, vec![(1, 1.0), (2, 3.0), (3, 6.0)]);
    }

    #[test]
    fn abort_resets_to_base_without_waiting() {
        let aborted = RoundRecord {
            matchday: 2,
            wagered: Some(2.0),
            settled: Some(Settlement { draw: false, aborted: true }),
        };
        let rounds = vec![lost(1), aborted, lost(3)];
        let out = replay(&POLICY, &team(3), 1, POLICY.initial(&team(3)), &rounds);
        assert_eq!(stakes(&out), vec![1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn replay_is_deterministic() {
        let rounds = vec![lost(1), drawn(2), lost(3), lost(4), lost(5)];
        let a = replay_from_last_draw(&POLICY, &team(1), &rounds);
        let b = replay_from_last_draw(&POLICY, &team(1), &rounds);
        assert_eq!(a, b);
    }

    #[test]
    fn last_draw_finds_latest() {
        let rounds = vec![drawn(1), lost(2), drawn(3), lost(4)];
        assert_eq!(last_draw(&rounds), Some(3));
        assert_eq!(last_draw(&rounds[1..2]), None);
    }
}
