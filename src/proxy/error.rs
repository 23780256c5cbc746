//! Error taxonomy for the proxy path.
//!
//! `Parameter` never reaches the pipeline; everything else is carried inside
//! a `ProxyOutcome::Failure` or produced by the dispatch gate itself.

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::proxy::types::CancelReason;

/// Longest downstream body excerpt kept in an error message.
const EXCERPT_LIMIT: usize = 256;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid parameter `{field}`: {reason}")]
    Parameter { field: String, reason: String },

    #[error("can not build request body: {0}")]
    Encoding(String),

    #[error("error during request to {target}: {reason}")]
    Transport { target: String, reason: String },

    #[error("{target} answered {status}: {excerpt}")]
    UpstreamStatus {
        target: String,
        status: StatusCode,
        excerpt: String,
    },

    #[error("error during body response from {target}: {reason}")]
    Read { target: String, reason: String },

    #[error("can not decode response from {target}: {reason}")]
    Decoding { target: String, reason: String },

    #[error("timeout from server: {target} (waited {waited:?})")]
    Timeout { target: String, waited: Duration },

    #[error("request to {target} cancelled: {reason}")]
    Cancelled { target: String, reason: CancelReason },

    #[error("pipeline for {target} terminated abnormally: {detail}")]
    Aborted { target: String, detail: String },
}

impl ProxyError {
    pub fn parameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short category used as the `message` of the JSON envelope and as a
    /// metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Parameter { .. } => "bad request",
            ProxyError::Encoding(_) => "can not marshal request",
            ProxyError::Transport { .. }
            | ProxyError::UpstreamStatus { .. }
            | ProxyError::Read { .. } => "response error",
            ProxyError::Decoding { .. } => "can not decode response",
            ProxyError::Timeout { .. } => "timeout",
            ProxyError::Cancelled { .. } => "cancelled",
            ProxyError::Aborted { .. } => "internal error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Parameter { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// First bytes of a downstream body, lossily decoded, for diagnostics.
pub(crate) fn excerpt(body: &[u8]) -> String {
    let end = body.len().min(EXCERPT_LIMIT);
    let mut text = String::from_utf8_lossy(&body[..end]).into_owned();
    if body.len() > EXCERPT_LIMIT {
        text.push_str("...");
    }
    text
}
