//! Login, logout and account handlers.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{cookie_value, set_cookie, AuthError};
use crate::http::response::{error_response, success};
use crate::http::server::AppState;

/// Cookie the front-end sets to choose where `/callback` lands.
pub const CALLBACK_COOKIE: &str = "callback";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Profile returned by `/account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub picture: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        error_response(StatusCode::BAD_REQUEST, "authentication failed", Some(self.to_string()))
    }
}

pub async fn health() -> Response {
    Json(serde_json::json!({"status": "success"})).into_response()
}

pub async fn login(State(state): State<AppState>) -> Response {
    let login_state = state.login_states.issue();
    Json(serde_json::json!({"ref": state.identity.authorize_url(&login_state)})).into_response()
}

pub async fn signin(State(state): State<AppState>) -> Response {
    let login_state = state.login_states.issue();
    redirect(&state.identity.authorize_url(&login_state))
}

pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let state_ok = query
        .state
        .as_deref()
        .map(|s| state.login_states.take(s))
        .unwrap_or(false);
    if !state_ok {
        return error_response(StatusCode::BAD_REQUEST, "no current state found", None);
    }
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "no code in query", None);
    };

    let tokens = match state.identity.exchange(&code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "Code exchange failed");
            return error_response(StatusCode::BAD_REQUEST, "error getting access token", Some(e.to_string()));
        }
    };
    state.tokens.put_session(&tokens);
    tracing::info!(sessions = state.tokens.len(), "Session established");

    let auth = &state.config.auth;
    let max_age = auth.token_ttl_secs as i64;
    let target = cookie_value(&headers, CALLBACK_COOKIE).unwrap_or(&auth.post_login_redirect);

    let mut response = redirect(target);
    for (name, value) in [
        (&auth.access_cookie, &tokens.access_token),
        (&auth.refresh_cookie, &tokens.refresh_token),
        (&auth.id_cookie, &tokens.id_token),
    ] {
        if let Some(cookie) = set_cookie(name, value, max_age, &auth.cookie_domain) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = &state.config.auth;
    if let Some(token) = cookie_value(&headers, &auth.access_cookie) {
        state.tokens.remove(token);
    }

    let mut response = Json(serde_json::json!({"status": "success"})).into_response();
    for name in [&auth.access_cookie, &auth.refresh_cookie, &auth.id_cookie] {
        if let Some(cookie) = set_cookie(name, "", -1, &auth.cookie_domain) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}

pub async fn account(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session) = state.sessions.session(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "not authorized", None);
    };
    let Some(id_token) = cookie_value(&headers, &state.config.auth.id_cookie) else {
        return error_response(StatusCode::BAD_REQUEST, "no ID token found", None);
    };
    if session.id_token.as_deref().is_some_and(|bound| bound != id_token) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "error verifying ID token",
            Some("ID token does not belong to this session".to_string()),
        );
    }

    match state.identity.verify(id_token).await {
        Ok(claims) => success(User {
            id: claims.nickname.clone(),
            name: claims.nickname,
            picture: claims.picture,
        }),
        Err(e) => e.into_response(),
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "invalid redirect target", None),
    }
}
