//! Shared-password gate: a login handler that issues a session cookie and a
//! middleware that rejects requests without a known session.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashSet;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::routes::ApiState;
use crate::config::SESSION_COOKIE;
use crate::error::AppError;

/// Session tokens handed out since startup. Tokens have no expiry; they live
/// until logout or restart.
#[derive(Default)]
pub struct SessionStore {
    tokens: DashSet<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone());
        token
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn remove(&self, token: &str) {
        self.tokens.remove(token);
    }
}

/// Value of the session cookie, if the request carries one.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

fn session_cookie(value: &str, secure: bool, expire: bool) -> Result<HeaderValue, AppError> {
    let mut cookie = format!("{SESSION_COOKIE}={value}; HttpOnly; SameSite=Lax; Path=/");
    if expire {
        cookie.push_str("; Max-Age=0");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Config(format!("invalid cookie value: {e}")))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

pub async fn login(
    State(state): State<ApiState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, AppError> {
    if body.password != state.cfg.dashboard_password {
        warn!("Rejected dashboard login");
        return Err(AppError::Unauthorized("Invalid password"));
    }
    let token = state.sessions.create();
    let cookie = session_cookie(&token, state.cfg.secure_cookies, false)?;
    info!("Dashboard login");
    Ok(([(header::SET_COOKIE, cookie)], Json(json!({ "success": true }))).into_response())
}

pub async fn logout(State(state): State<ApiState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(token) = session_token(&headers) {
        state.sessions.remove(token);
    }
    let cookie = session_cookie("", state.cfg.secure_cookies, true)?;
    Ok(([(header::SET_COOKIE, cookie)], Json(json!({ "success": true }))).into_response())
}

pub async fn require_session(
    State(state): State<ApiState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = session_token(req.headers()).is_some_and(|token| state.sessions.contains(token));
    if !authorized {
        return Err(AppError::Unauthorized("Not logged in"));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; monbetsx_session=abc-123; lang=de"),
        );
        assert_eq!(session_token(&headers), Some("abc-123"));
    }

    #[test]
    fn no_cookie_no_session() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("monbetsx_sessionx=1"));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn tokens_are_forgotten_on_remove() {
        let store = SessionStore::new();
        let token = store.create();
        assert!(store.contains(&token));
        store.remove(&token);
        assert!(!store.contains(&token));
    }
}
