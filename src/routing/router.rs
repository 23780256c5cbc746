//! ML route lookup.
//!
//! # Responsibilities
//! - Build one Transport per downstream family
//! - Build one DispatchGate per ML route with its target URL and deadline
//! - Hand handlers the gate and target for a route
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc, no locks)
//! - Every route in the table is built, so lookup is infallible
//! - Transports are injected by family so tests can substitute doubles

use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::config::{DownstreamConfig, TimeoutConfig, TransportConfig};
use crate::proxy::{DispatchGate, HyperTransport, Pipeline, Transport};
use crate::routing::table::{Family, MlRoute, TimeoutClass};

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("invalid downstream URL for {family} route '{route}': {source}")]
    InvalidTarget {
        family: &'static str,
        route: &'static str,
        #[source]
        source: url::ParseError,
    },
}

struct RouteEntry {
    gate: DispatchGate,
    target: Url,
}

/// Compiled ML routes.
pub struct MlRouter {
    entries: HashMap<MlRoute, RouteEntry>,
}

impl MlRouter {
    /// Build routes over pooled hyper clients, one per family.
    pub fn new(
        downstream: &DownstreamConfig,
        timeouts: &TimeoutConfig,
        transport: &TransportConfig,
    ) -> Result<Self, RoutingError> {
        let transports: HashMap<Family, Arc<dyn Transport>> = Family::ALL
            .into_iter()
            .map(|family| {
                let client: Arc<dyn Transport> = Arc::new(HyperTransport::new(transport));
                (family, client)
            })
            .collect();

        Self::with_transports(downstream, timeouts, transport.max_response_bytes, |family| {
            transports[&family].clone()
        })
    }

    /// Build routes over caller-supplied transports.
    pub fn with_transports<F>(
        downstream: &DownstreamConfig,
        timeouts: &TimeoutConfig,
        max_response_bytes: usize,
        transport_for: F,
    ) -> Result<Self, RoutingError>
    where
        F: Fn(Family) -> Arc<dyn Transport>,
    {
        let mut entries = HashMap::with_capacity(MlRoute::ALL.len());

        for route in MlRoute::ALL {
            let family = route.family();
            let base = match family {
                Family::General => &downstream.general_url,
                Family::Audio => &downstream.audio_url,
                Family::TimeSeries => &downstream.timeseries_url,
            };
            let target = join_target(base, route.downstream_path()).map_err(|source| {
                RoutingError::InvalidTarget {
                    family: family.name(),
                    route: route.name(),
                    source,
                }
            })?;

            let timeout = match route.timeout_class() {
                TimeoutClass::Media => timeouts.media(),
                TimeoutClass::Message => timeouts.message(),
            };

            let pipeline = Arc::new(Pipeline::new(
                transport_for(family),
                route.decoder(),
                max_response_bytes,
            ));

            tracing::debug!(
                route = route.name(),
                target = %target,
                timeout_secs = timeout.as_secs(),
                "ML route compiled"
            );

            entries.insert(
                route,
                RouteEntry {
                    gate: DispatchGate::new(route.name(), pipeline, timeout),
                    target,
                },
            );
        }

        Ok(Self { entries })
    }

    pub fn gate(&self, route: MlRoute) -> &DispatchGate {
        &self.entries[&route].gate
    }

    /// Downstream URL the route posts to.
    pub fn target(&self, route: MlRoute) -> &Url {
        &self.entries[&route].target
    }
}

fn join_target(base: &str, path: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}/{}", base.trim_end_matches('/'), path))
}
