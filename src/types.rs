use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Match result
// ---------------------------------------------------------------------------

/// Final result of a fixture, stored in `matches.result` as "1" / "x" / "2".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    HomeWin,
    Draw,
    AwayWin,
}

impl MatchResult {
    pub fn from_goals(home_goals: i64, away_goals: i64) -> Self {
        match home_goals.cmp(&away_goals) {
            std::cmp::Ordering::Greater => MatchResult::HomeWin,
            std::cmp::Ordering::Equal => MatchResult::Draw,
            std::cmp::Ordering::Less => MatchResult::AwayWin,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            MatchResult::HomeWin => "1",
            MatchResult::Draw => "x",
            MatchResult::AwayWin => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "1" => Some(MatchResult::HomeWin),
            "x" => Some(MatchResult::Draw),
            "2" => Some(MatchResult::AwayWin),
            _ => None,
        }
    }

    pub fn is_draw(&self) -> bool {
        *self == MatchResult::Draw
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchResult::HomeWin => "home win",
            MatchResult::Draw => "draw",
            MatchResult::AwayWin => "away win",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Side of a fixture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn other(&self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Home => write!(f, "home"),
            Side::Away => write!(f, "away"),
        }
    }
}

// ---------------------------------------------------------------------------
// Result from one team's point of view
// ---------------------------------------------------------------------------

/// How a finished fixture ended for one of its two teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamOutcome {
    Draw,
    Won,
    Lost,
}

impl TeamOutcome {
    pub fn for_side(result: MatchResult, side: Side) -> Self {
        match (result, side) {
            (MatchResult::Draw, _) => TeamOutcome::Draw,
            (MatchResult::HomeWin, Side::Home) | (MatchResult::AwayWin, Side::Away) => TeamOutcome::Won,
            _ => TeamOutcome::Lost,
        }
    }
}
