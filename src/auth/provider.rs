//! Identity provider client.
//!
//! # Responsibilities
//! - Build the OAuth2 authorize URL for a login `state`
//! - Exchange an authorization code for access, refresh and ID tokens
//! - Decode and check the claims of an ID token
//!
//! # Design Decisions
//! - A capability trait so handlers and tests never see the HTTP client
//! - ID tokens are only trusted when they were bound to a stored session by
//!   the code exchange; `verify` checks audience, expiry and issuer

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

use crate::config::AuthConfig;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),

    #[error("token exchange rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("no id_token in token response")]
    MissingIdToken,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token expired")]
    Expired,

    #[error("token audience does not include this client")]
    WrongAudience,

    #[error("token issued by '{0}'")]
    WrongIssuer(String),
}

/// Tokens returned by a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
}

/// Profile claims surfaced on `/account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub email_verified: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// URL the browser is sent to for login.
    fn authorize_url(&self, state: &str) -> String;

    async fn exchange(&self, code: &str) -> Result<TokenSet, AuthError>;

    async fn verify(&self, id_token: &str) -> Result<Claims, AuthError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    id_token: Option<String>,
}

/// Registered claims checked on every ID token.
#[derive(Deserialize)]
struct Registered {
    exp: u64,
    #[serde(default)]
    iss: String,
    aud: Audience,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::One(aud) => aud == client_id,
            Audience::Many(auds) => auds.iter().any(|a| a == client_id),
        }
    }
}

/// OAuth2/OIDC provider reached over HTTP.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    config: AuthConfig,
}

impl HttpIdentityProvider {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    fn authorize_url(&self, state: &str) -> String {
        let scopes = self.config.scopes.join(" ");
        match Url::parse(&self.config.authorize_url) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("client_id", &self.config.client_id)
                    .append_pair("redirect_uri", &self.config.redirect_url)
                    .append_pair("response_type", "code")
                    .append_pair("scope", &scopes)
                    .append_pair("state", state);
                url.to_string()
            }
            // Validated at startup.
            Err(_) => self.config.authorize_url.clone(),
        }
    }

    async fn exchange(&self, code: &str) -> Result<TokenSet, AuthError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("client_id", &self.config.client_id)
            .append_pair("client_secret", &self.config.client_secret)
            .finish();

        let response = self
            .client
            .post(&self.config.token_url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(form)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;

        Ok(TokenSet {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            id_token: tokens.id_token.ok_or(AuthError::MissingIdToken)?,
        })
    }

    async fn verify(&self, id_token: &str) -> Result<Claims, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        check_id_token(id_token, &self.config.client_id, &self.config.issuer, now)
    }
}

/// Decode a compact JWT and check its registered claims.
pub fn check_id_token(
    id_token: &str,
    client_id: &str,
    issuer: &str,
    now: u64,
) -> Result<Claims, AuthError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::Malformed("not a JWT".to_string()))?;
    let json = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::Malformed(e.to_string()))?;

    let registered: Registered =
        serde_json::from_slice(&json).map_err(|e| AuthError::Malformed(e.to_string()))?;
    if registered.exp <= now {
        return Err(AuthError::Expired);
    }
    if !registered.aud.contains(client_id) {
        return Err(AuthError::WrongAudience);
    }
    if !issuer.is_empty() && registered.iss.trim_end_matches('/') != issuer.trim_end_matches('/') {
        return Err(AuthError::WrongIssuer(registered.iss));
    }

    serde_json::from_slice(&json).map_err(|e| AuthError::Malformed(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn jwt(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn test_valid_token() {
        let token = jwt(json!({
            "iss": "https://gitlab.example.com",
            "aud": "client",
            "exp": 2_000,
            "nickname": "ada",
            "picture": "https://img/ada.png",
            "email_verified": true
        }));
        let claims = check_id_token(&token, "client", "https://gitlab.example.com/", 1_000).unwrap();
        assert_eq!(claims.nickname, "ada");
        assert_eq!(claims.picture, "https://img/ada.png");
        assert!(claims.email_verified);
    }

    #[test]
    fn test_audience_list() {
        let token = jwt(json!({"aud": ["other", "client"], "exp": 2_000}));
        let claims = check_id_token(&token, "client", "", 1_000).unwrap();
        assert_eq!(claims.nickname, "");
    }

    #[test]
    fn test_rejections() {
        let expired = jwt(json!({"aud": "client", "exp": 10}));
        assert!(matches!(check_id_token(&expired, "client", "", 1_000), Err(AuthError::Expired)));

        let foreign = jwt(json!({"aud": "someone-else", "exp": 2_000}));
        assert!(matches!(
            check_id_token(&foreign, "client", "", 1_000),
            Err(AuthError::WrongAudience)
        ));

        let issuer = jwt(json!({"aud": "client", "exp": 2_000, "iss": "https://evil"}));
        assert!(matches!(
            check_id_token(&issuer, "client", "https://gitlab.example.com", 1_000),
            Err(AuthError::WrongIssuer(_))
        ));

        assert!(matches!(
            check_id_token("garbage", "client", "", 1_000),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_authorize_url() {
        let config = AuthConfig {
            client_id: "abc".to_string(),
            ..AuthConfig::default()
        };
        let provider = HttpIdentityProvider::new(config).unwrap();
        let url = Url::parse(&provider.authorize_url("xyz")).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "abc");
        assert_eq!(pairs["state"], "xyz");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], "openid api");
    }
}
