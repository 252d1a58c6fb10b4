use axum::Json;
use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{LoginRequest, LoginResponse};
use super::state::{ServerError, ServerState};

pub(crate) const AUTH_COOKIE: &str = "authToken";
/// 52 weeks.
pub(crate) const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7 * 52;

/// Value stored in the session cookie. Derived from the secret so the
/// cookie never carries the password itself.
pub(crate) fn session_token(secret: &str) -> String {
    format!("{:x}", md5::compute(format!("riddle-solver:{}", secret)))
}

pub(crate) fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        AUTH_COOKIE, token, SESSION_MAX_AGE_SECS
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

pub(crate) fn is_authenticated(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret.filter(|secret| !secret.is_empty()) else {
        return false;
    };
    cookie_value(headers, AUTH_COOKIE)
        .map(|token| token == session_token(secret))
        .unwrap_or(false)
}

pub(crate) fn require_auth(headers: &HeaderMap, state: &ServerState) -> Result<(), ServerError> {
    if is_authenticated(headers, state.secret.as_deref()) {
        Ok(())
    } else {
        Err(ServerError::unauthorized())
    }
}

pub(crate) async fn login(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let secret = state
        .secret
        .as_deref()
        .filter(|secret| !secret.is_empty());
    let Some(secret) = secret.filter(|secret| *secret == payload.password) else {
        warn!("rejected login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Json(LoginResponse { success: false }),
        )
            .into_response();
    };

    info!("login accepted");
    let cookie = session_cookie(&session_token(secret), state.settings.secure_cookie);
    let mut response = Json(LoginResponse { success: true }).into_response();
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().insert(SET_COOKIE, value);
            response
        }
        Err(err) => ServerError::internal(format!("failed to build session cookie: {}", err))
            .into_response(),
    }
}
