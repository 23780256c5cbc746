//! Outbound connection management.
//!
//! # Responsibilities
//! - Own the pooled HTTP client used for one downstream family
//! - Cap idle connections and their lifetime
//! - Never ask for compressed responses
//!
//! # Design Decisions
//! - One `HyperTransport` per downstream family, built at startup and never
//!   reconfigured
//! - No per-call timeout here; the dispatch gate governs liveness
//! - `Transport` is a trait so handlers can be exercised against doubles

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::BoxError;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use std::time::Duration;

use crate::config::TransportConfig;

/// Sends one fully-built request and returns the downstream response.
///
/// Implementations must be safe to share across concurrent pipeline runs.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError>;
}

/// Pooled `hyper` client transport.
#[derive(Clone, Debug)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    pub fn new(config: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .build(connector);

        Self { client }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError> {
        let response = self.client.request(request).await?;
        Ok(response.map(Body::new))
    }
}
