use crate::error::{AppError, Result};

pub const OPENLIGA_API_URL: &str = "https://api.openligadb.de";
pub const ODDS_API_URL: &str = "https://api.the-odds-api.com/v4";
pub const ODDS_BOOKMAKER: &str = "tipico_de";

/// A side whose stake exceeds this amount triggers the alternative-stake proposal.
pub const STAKE_ALERT_THRESHOLD: f64 = 250.0;

/// Upper bound for `games_to_wait_after_draw` (one full season of rounds).
pub const MAX_WAIT_AFTER_DRAW: i64 = 34;

/// OpenLigaDB `resultTypeID` of the final score ("Endergebnis").
pub const FINAL_RESULT_TYPE_ID: i64 = 2;

/// Timeout applied to every outbound provider request.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

pub const SESSION_COOKIE: &str = "monbetsx_session";

/// One of the two tracked divisions and its keys at each provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueConfig {
    /// Local `league_shortcut` stored on teams and matches.
    pub shortcut: String,
    /// League key in the OpenLigaDB path.
    pub openliga_key: String,
    /// Sport key at The Odds API.
    pub odds_key: String,
    pub name: String,
}

impl LeagueConfig {
    fn new(shortcut: &str, openliga_key: &str, odds_key: &str, name: &str) -> Self {
        Self {
            shortcut: shortcut.to_string(),
            openliga_key: openliga_key.to_string(),
            odds_key: odds_key.to_string(),
            name: name.to_string(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("bl1", "bl1", "soccer_germany_bundesliga", "1. Bundesliga"),
            Self::new("bl2", "bl2", "soccer_germany_bundesliga2", "2. Bundesliga"),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Season key used by every query (SEASON).
    pub season: String,
    /// Shared dashboard secret (DASHBOARD_PASSWORD).
    pub dashboard_password: String,
    pub secure_cookies: bool,
    pub openliga_api_url: String,
    pub odds_api_url: String,
    /// Empty disables the odds importer.
    pub odds_api_key: String,
    pub odds_bookmaker: String,
    /// Stake assumed when no team_stakes row exists (STAKE_FLOOR).
    pub stake_floor: f64,
    /// First stake of an escalation chain (BASE_STAKE).
    pub base_stake: f64,
    /// Multiplier after a lost round (ESCALATION_FACTOR).
    pub escalation_factor: f64,
    /// Period of the in-process import scheduler; 0 = disabled (IMPORT_INTERVAL_SECS).
    pub import_interval_secs: u64,
    pub leagues: Vec<LeagueConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "monbetsx.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            season: std::env::var("SEASON").unwrap_or_else(|_| "2025".to_string()),
            dashboard_password: std::env::var("DASHBOARD_PASSWORD").unwrap_or_default(),
            secure_cookies: std::env::var("SECURE_COOKIES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            openliga_api_url: std::env::var("OPENLIGA_API_URL")
                .unwrap_or_else(|_| OPENLIGA_API_URL.to_string()),
            odds_api_url: std::env::var("ODDS_API_URL").unwrap_or_else(|_| ODDS_API_URL.to_string()),
            odds_api_key: std::env::var("ODDS_API_KEY").unwrap_or_default(),
            odds_bookmaker: std::env::var("ODDS_BOOKMAKER")
                .unwrap_or_else(|_| ODDS_BOOKMAKER.to_string()),
            stake_floor: parse_amount("STAKE_FLOOR", 0.0)?,
            base_stake: parse_amount("BASE_STAKE", 1.0)?,
            escalation_factor: parse_amount("ESCALATION_FACTOR", 2.0)?,
            import_interval_secs: std::env::var("IMPORT_INTERVAL_SECS")
                .unwrap_or_else(|_| "0".to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("IMPORT_INTERVAL_SECS must be a whole number of seconds".to_string())
                })?,
            leagues: LeagueConfig::defaults(),
        })
    }

    /// The dashboard refuses to start without a password; the import job does not need one.
    pub fn require_dashboard_password(&self) -> Result<()> {
        if self.dashboard_password.is_empty() {
            return Err(AppError::Config("DASHBOARD_PASSWORD must be set".to_string()));
        }
        Ok(())
    }

    pub fn league(&self, shortcut: &str) -> Option<&LeagueConfig> {
        self.leagues.iter().find(|l| l.shortcut == shortcut)
    }
}

fn parse_amount(var: &str, default: f64) -> Result<f64> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| AppError::Config(format!("{var} must be a non-negative number"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        log_level: "debug".to_string(),
        db_path: ":memory:".to_string(),
        api_port: 0,
        season: "2025".to_string(),
        dashboard_password: "secret".to_string(),
        secure_cookies: false,
        openliga_api_url: OPENLIGA_API_URL.to_string(),
        odds_api_url: ODDS_API_URL.to_string(),
        odds_api_key: "test-key".to_string(),
        odds_bookmaker: ODDS_BOOKMAKER.to_string(),
        stake_floor: 0.0,
        base_stake: 1.0,
        escalation_factor: 2.0,
        import_interval_secs: 0,
        leagues: LeagueConfig::defaults(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_is_rejected() {
        let mut cfg = test_config();
        assert!(cfg.require_dashboard_password().is_ok());
        cfg.dashboard_password.clear();
        assert!(matches!(cfg.require_dashboard_password(), Err(AppError::Config(_))));
    }

    #[test]
    fn leagues_map_to_provider_keys() {
        let cfg = test_config();
        assert_eq!(cfg.league("bl2").map(|l| l.odds_key.as_str()), Some("soccer_germany_bundesliga2"));
        assert!(cfg.league("pl").is_none());
    }
}
