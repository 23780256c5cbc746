//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool sizes > 0)
//! - Check URLs and addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use url::Url;

use crate::auth::store::MAX_LIFETIME;
use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }

    check_http_url(&mut errors, "downstream.general_url", &config.downstream.general_url);
    check_http_url(&mut errors, "downstream.audio_url", &config.downstream.audio_url);
    check_http_url(&mut errors, "downstream.timeseries_url", &config.downstream.timeseries_url);

    if config.timeouts.media_secs == 0 {
        errors.push(ValidationError::new("timeouts.media_secs", "must be > 0"));
    }
    if config.timeouts.message_secs == 0 {
        errors.push(ValidationError::new("timeouts.message_secs", "must be > 0"));
    }

    if config.transport.max_idle_per_host == 0 {
        errors.push(ValidationError::new("transport.max_idle_per_host", "must be > 0"));
    }
    if config.transport.idle_timeout_secs == 0 {
        errors.push(ValidationError::new("transport.idle_timeout_secs", "must be > 0"));
    }
    if config.transport.max_response_bytes == 0 {
        errors.push(ValidationError::new("transport.max_response_bytes", "must be > 0"));
    }

    for (field, name) in [
        ("auth.access_cookie", &config.auth.access_cookie),
        ("auth.refresh_cookie", &config.auth.refresh_cookie),
        ("auth.id_cookie", &config.auth.id_cookie),
    ] {
        if name.is_empty() || name.contains([';', '=', ' ']) {
            errors.push(ValidationError::new(field, format!("'{name}' is not a valid cookie name")));
        }
    }
    for (field, secs) in [
        ("auth.token_ttl_secs", config.auth.token_ttl_secs),
        ("auth.login_state_ttl_secs", config.auth.login_state_ttl_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        } else if secs > MAX_LIFETIME.as_secs() {
            errors.push(ValidationError::new(
                field,
                format!("must be <= {}", MAX_LIFETIME.as_secs()),
            ));
        }
    }
    if config.auth.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("auth.sweep_interval_secs", "must be > 0"));
    }
    check_http_url(&mut errors, "auth.authorize_url", &config.auth.authorize_url);
    check_http_url(&mut errors, "auth.token_url", &config.auth.token_url);
    if !config.auth.issuer.is_empty() {
        check_http_url(&mut errors, "auth.issuer", &config.auth.issuer);
    }

    check_http_url(&mut errors, "storage.public_base_url", &config.storage.public_base_url);
    if config.storage.bucket.is_empty() {
        errors.push(ValidationError::new("storage.bucket", "must not be empty"));
    }

    for origin in &config.cors.allowed_origins {
        if origin == "*" {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                "wildcard origin can not be combined with credentialed requests",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }
    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            "expected \"pretty\" or \"json\"",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("'{value}': {e}"))),
    }
}
