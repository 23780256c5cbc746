//! Per-request supervisor for the proxy pipeline.
//!
//! # Responsibilities
//! - Start the pipeline on a background task
//! - Wait for the first of: outcome, deadline
//! - Recover panics inside the task as a `Failure`
//! - Tell an abandoned pipeline to stop
//!
//! # Design Decisions
//! - Outcome and cancellation travel over two single-use oneshot channels
//! - Dropping the gate future (caller disconnect) drops the cancel sender,
//!   which the pipeline observes as `CallerGone`
//! - No retries

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::observability::metrics;
use crate::proxy::error::ProxyError;
use crate::proxy::pipeline::{CancelSignal, Pipeline};
use crate::proxy::types::{CancelReason, OutboundSpec, Payload, ProxyOutcome};

/// Supervises pipeline runs for one route with a fixed deadline.
#[derive(Clone)]
pub struct DispatchGate {
    route: &'static str,
    pipeline: Arc<Pipeline>,
    timeout: Duration,
}

impl DispatchGate {
    pub fn new(route: &'static str, pipeline: Arc<Pipeline>, timeout: Duration) -> Self {
        Self {
            route,
            pipeline,
            timeout,
        }
    }

    pub fn route(&self) -> &'static str {
        self.route
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `spec` through the pipeline and wait at most the configured timeout.
    pub async fn dispatch(&self, spec: OutboundSpec) -> Result<Payload, ProxyError> {
        let started = Instant::now();
        let target = spec.target().to_string();
        let route = self.route;

        let (outcome_tx, outcome_rx) = oneshot::channel::<ProxyOutcome>();
        let (cancel_tx, cancel) = CancelSignal::channel();
        let pipeline = Arc::clone(&self.pipeline);
        let task_target = target.clone();

        tracing::debug!(route, target = %target, timeout = ?self.timeout, "Dispatching outbound call");

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(pipeline.execute(spec, cancel))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let detail = panic_detail(panic.as_ref());
                    tracing::error!(route, target = %task_target, detail = %detail, "Recovered panic in proxy pipeline");
                    ProxyOutcome::Failure(ProxyError::Aborted {
                        target: task_target.clone(),
                        detail,
                    })
                });

            let label = outcome.label();
            if outcome_tx.send(outcome).is_err() {
                tracing::debug!(route, target = %task_target, outcome = label, "Outcome discarded, gate no longer waiting");
            }
        });

        let outcome = tokio::select! {
            received = outcome_rx => received.unwrap_or_else(|_| {
                ProxyOutcome::Failure(ProxyError::Aborted {
                    target: target.clone(),
                    detail: "pipeline ended without an outcome".into(),
                })
            }),
            _ = tokio::time::sleep(self.timeout) => {
                let _ = cancel_tx.send(CancelReason::DeadlineElapsed(self.timeout));
                let waited = started.elapsed();
                tracing::warn!(route, target = %target, waited_ms = waited.as_millis() as u64, "Downstream call timed out");
                metrics::record_proxy_outcome(route, "timeout", started);
                return Err(ProxyError::Timeout { target, waited });
            }
        };

        metrics::record_proxy_outcome(route, outcome.label(), started);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            ProxyOutcome::Success(payload) => {
                tracing::info!(route, target = %target, elapsed_ms, "Downstream call succeeded");
                Ok(payload)
            }
            ProxyOutcome::Failure(e) => {
                tracing::error!(route, target = %target, elapsed_ms, error = %e, "Downstream call failed");
                Err(e)
            }
            ProxyOutcome::Cancelled(reason) => {
                tracing::warn!(route, target = %target, reason = %reason, "Downstream call cancelled");
                Err(ProxyError::Cancelled { target, reason })
            }
        }
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
