//! One encode → send → read → decode cycle against a downstream service.
//!
//! # Responsibilities
//! - Build the outbound request from an `OutboundSpec`
//! - Execute it on the shared transport
//! - Buffer the whole response body and apply the configured decoder
//! - Stop promptly when the dispatch gate cancels
//!
//! # Design Decisions
//! - Every exit path yields exactly one `ProxyOutcome`
//! - Cancellation drops the in-flight exchange future, which releases the
//!   connection and the response body
//! - Steps are strictly ordered: encode, send, read, decode

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::http::X_REQUEST_ID;
use crate::proxy::decoder::Decoder;
use crate::proxy::encoder::{self, EncodedBody};
use crate::proxy::error::{excerpt, ProxyError};
use crate::proxy::transport::Transport;
use crate::proxy::types::{CancelReason, OutboundSpec, Payload, ProxyOutcome};

/// Receiving half of the cancellation signal handed to a pipeline run.
///
/// Resolves with the reason sent by the gate, or `CallerGone` when the gate
/// itself was dropped.
#[derive(Debug)]
pub struct CancelSignal(oneshot::Receiver<CancelReason>);

impl CancelSignal {
    /// Create a linked sender/signal pair.
    pub fn channel() -> (oneshot::Sender<CancelReason>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self(rx))
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(self) -> CancelReason {
        self.0.await.unwrap_or(CancelReason::CallerGone)
    }
}

/// Executes outbound calls for one route.
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    decoder: Decoder,
    max_response_bytes: usize,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>, decoder: Decoder, max_response_bytes: usize) -> Self {
        Self {
            transport,
            decoder,
            max_response_bytes,
        }
    }

    pub fn decoder(&self) -> Decoder {
        self.decoder
    }

    /// Run the pipeline to completion or until `cancel` fires.
    pub async fn execute(&self, spec: OutboundSpec, cancel: CancelSignal) -> ProxyOutcome {
        let target = spec.target().to_string();

        let encoded = match encoder::encode(&spec).await {
            Ok(encoded) => encoded,
            Err(e) => return ProxyOutcome::Failure(e),
        };
        let request = match build_request(&spec, encoded) {
            Ok(request) => request,
            Err(e) => return ProxyOutcome::Failure(e),
        };

        tokio::select! {
            biased;
            reason = cancel.cancelled() => {
                tracing::debug!(target = %target, reason = %reason, "Outbound call abandoned");
                ProxyOutcome::Cancelled(reason)
            }
            result = self.exchange(&target, request) => match result {
                Ok(payload) => ProxyOutcome::Success(payload),
                Err(e) => ProxyOutcome::Failure(e),
            },
        }
    }

    async fn exchange(&self, target: &str, request: Request<Body>) -> Result<Payload, ProxyError> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ProxyError::Transport {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, self.max_response_bytes)
            .await
            .map_err(|e| ProxyError::Read {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        if !parts.status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                target: target.to_string(),
                status: parts.status,
                excerpt: excerpt(&bytes),
            });
        }

        self.decoder.decode(bytes).map_err(|reason| ProxyError::Decoding {
            target: target.to_string(),
            reason,
        })
    }
}

fn build_request(spec: &OutboundSpec, encoded: EncodedBody) -> Result<Request<Body>, ProxyError> {
    let mut builder = Request::builder()
        .method(spec.method().clone())
        .uri(spec.target().as_str())
        .header(header::CONTENT_TYPE, encoded.content_type)
        .header(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    if let Some(id) = spec.request_id() {
        builder = builder.header(X_REQUEST_ID, id);
    }

    builder
        .body(Body::from(encoded.body))
        .map_err(|e| ProxyError::Encoding(format!("can not build a request: {e}")))
}
