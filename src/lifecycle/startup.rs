//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated configuration
//! - Start background tasks (metrics exporter, token sweeper)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::auth::{run_sweeper, AuthError, HttpIdentityProvider};
use crate::config::GatewayConfig;
use crate::http::AppState;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::{MlRouter, RoutingError};
use crate::storage::InMemoryObjectStore;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("identity provider: {0}")]
    Auth(#[from] AuthError),

    #[error("metrics exporter: {0}")]
    Metrics(String),
}

/// Build application state with the bundled adapters.
pub fn build_state(config: GatewayConfig) -> Result<AppState, StartupError> {
    let ml = MlRouter::new(&config.downstream, &config.timeouts, &config.transport)?;
    let identity = Arc::new(HttpIdentityProvider::new(config.auth.clone())?);
    let objects = Arc::new(InMemoryObjectStore::new(&config.storage));

    tracing::info!(
        general = %config.downstream.general_url,
        audio = %config.downstream.audio_url,
        timeseries = %config.downstream.timeseries_url,
        media_timeout_secs = config.timeouts.media_secs,
        message_timeout_secs = config.timeouts.message_secs,
        auth_enforced = config.auth.enforce,
        "Subsystems initialized"
    );

    Ok(AppState::new(config, ml, identity, objects))
}

/// Install the Prometheus exporter if enabled.
pub fn start_metrics(config: &GatewayConfig) -> Result<(), StartupError> {
    if !config.observability.metrics_enabled {
        return Ok(());
    }
    let addr: SocketAddr = config
        .observability
        .metrics_address
        .parse()
        .map_err(|e: std::net::AddrParseError| StartupError::Metrics(e.to_string()))?;
    metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))
}

/// Spawn the expired-session sweeper; it stops on shutdown.
pub fn spawn_sweeper(state: &AppState, shutdown: &Shutdown) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.auth.sweep_interval_secs);
    tokio::spawn(run_sweeper(
        state.tokens.clone(),
        state.login_states.clone(),
        interval,
        shutdown.subscribe(),
    ))
}
