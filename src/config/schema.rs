//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Base URLs of the downstream ML services.
    pub downstream: DownstreamConfig,

    /// Per-route deadlines.
    pub timeouts: TimeoutConfig,

    /// Outbound connection pool settings.
    pub transport: TransportConfig,

    /// Session cookies and identity provider.
    pub auth: AuthConfig,

    /// Object store settings for the media routes.
    pub storage: StorageConfig,

    /// Cross-origin settings for the browser front-end.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8088").
    pub bind_address: String,

    /// Maximum accepted request body in bytes (uploads included).
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8088".to_string(),
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Downstream service families.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Image and message models.
    pub general_url: String,

    /// Track and melody models.
    pub audio_url: String,

    /// Time-series forecaster.
    pub timeseries_url: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            general_url: "http://localhost:9090".to_string(),
            audio_url: "http://localhost:9090".to_string(),
            timeseries_url: "http://localhost:9090".to_string(),
        }
    }
}

/// Deadlines for the ML routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for routes that upload or return large media, in seconds.
    pub media_secs: u64,

    /// Deadline for lightweight JSON routes, in seconds.
    pub message_secs: u64,
}

impl TimeoutConfig {
    pub fn media(&self) -> Duration {
        Duration::from_secs(self.media_secs)
    }

    pub fn message(&self) -> Duration {
        Duration::from_secs(self.message_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            media_secs: 3600,
            message_secs: 30,
        }
    }
}

/// Outbound connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Idle connections kept per downstream host.
    pub max_idle_per_host: usize,

    /// Idle connection lifetime in seconds.
    pub idle_timeout_secs: u64,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Largest downstream body buffered in memory.
    pub max_response_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout_secs: 600,
            connect_timeout_secs: 10,
            max_response_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Session and identity-provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a known access token on the ML and media routes.
    pub enforce: bool,

    pub access_cookie: String,
    pub refresh_cookie: String,
    pub id_cookie: String,

    /// Cookie domain; omitted from `Set-Cookie` when empty.
    pub cookie_domain: String,

    /// Lifetime of a stored access token and of the session cookies.
    pub token_ttl_secs: u64,

    /// How often expired tokens are purged.
    pub sweep_interval_secs: u64,

    /// Lifetime of a pending login `state`.
    pub login_state_ttl_secs: u64,

    /// OAuth2 endpoints of the identity provider.
    pub authorize_url: String,
    pub token_url: String,

    /// Expected `iss` claim of ID tokens; not checked when empty.
    pub issuer: String,

    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,

    /// Where `/callback` sends the browser when no `callback` cookie is set.
    pub post_login_redirect: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enforce: false,
            access_cookie: "cb_access_token".to_string(),
            refresh_cookie: "cb_refresh_token".to_string(),
            id_cookie: "cb_id_token".to_string(),
            cookie_domain: String::new(),
            token_ttl_secs: 3600,
            sweep_interval_secs: 60,
            login_state_ttl_secs: 600,
            authorize_url: "https://gitlab.example.com/oauth/authorize".to_string(),
            token_url: "https://gitlab.example.com/oauth/token".to_string(),
            issuer: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: "http://localhost:8088/callback".to_string(),
            scopes: vec!["openid".to_string(), "api".to_string()],
            post_login_redirect: "http://localhost:3000/".to_string(),
        }
    }
}

/// Object store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,

    /// Base URL presigned links are issued under.
    pub public_base_url: String,

    /// Lifetime of presigned links in seconds.
    pub presign_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "app".to_string(),
            public_base_url: "http://localhost:9000".to_string(),
            presign_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the gateway with credentials.
    pub allowed_origins: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            max_age_secs: 12 * 60 * 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9091".to_string(),
        }
    }
}
