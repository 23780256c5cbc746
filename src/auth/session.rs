//! Session cookies and the authorization guard.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::auth::store::{TokenRecord, TokenStore};
use crate::config::AuthConfig;
use crate::http::response::error_response;

/// Value of cookie `name` across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Build a `Set-Cookie` value. A negative `max_age` expires the cookie.
pub fn set_cookie(name: &str, value: &str, max_age: i64, domain: &str) -> Option<HeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax", max_age.max(0));
    if max_age < 0 {
        cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
    }
    if !domain.is_empty() {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    HeaderValue::from_str(&cookie).ok()
}

/// Checks inbound requests against the token store.
#[derive(Clone)]
pub struct SessionGuard {
    tokens: TokenStore,
    access_cookie: String,
    enforce: bool,
}

impl SessionGuard {
    pub fn new(tokens: TokenStore, config: &AuthConfig) -> Self {
        Self {
            tokens,
            access_cookie: config.access_cookie.clone(),
            enforce: config.enforce,
        }
    }

    pub fn enforced(&self) -> bool {
        self.enforce
    }

    /// The live session record for the request's access cookie.
    pub fn session(&self, headers: &HeaderMap) -> Option<TokenRecord> {
        cookie_value(headers, &self.access_cookie).and_then(|token| self.tokens.get(token))
    }

    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        cookie_value(headers, &self.access_cookie)
            .map(|token| self.tokens.contains(token))
            .unwrap_or(false)
    }
}

/// Rejects requests without a live session when enforcement is on.
pub async fn require_session(
    State(guard): State<SessionGuard>,
    request: Request,
    next: Next,
) -> Response {
    if !guard.enforce || guard.is_authorized(request.headers()) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "Rejected request without session");
    error_response(StatusCode::UNAUTHORIZED, "not authorized", None)
}
