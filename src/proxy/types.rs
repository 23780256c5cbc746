//! Data model shared by the encoder, pipeline and dispatch gate.

use axum::body::Bytes;
use axum::http::Method;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::proxy::error::ProxyError;

/// Content type used for every file part, matching what the ML services expect.
pub const FILE_PART_CONTENT_TYPE: &str = "application/octet-stream";

/// How the outbound body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Multipart,
    Json,
}

/// A single named file attached to a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub data: Bytes,
}

impl FilePart {
    pub fn new(field: impl Into<String>, filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            field: field.into(),
            filename: filename.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum OutboundBody {
    Multipart {
        fields: Vec<(String, String)>,
        file: Option<FilePart>,
    },
    Json(serde_json::Value),
}

/// Description of one outbound call to a downstream service.
///
/// Built once by a handler, then handed over to the pipeline invocation that
/// owns it. There are no setters after construction; the builder methods
/// consume `self`.
#[derive(Debug, Clone)]
pub struct OutboundSpec {
    method: Method,
    target: Url,
    body: OutboundBody,
    request_id: Option<String>,
}

impl OutboundSpec {
    /// Start a multipart `POST` to `target` with no fields.
    pub fn multipart(target: Url) -> Self {
        Self {
            method: Method::POST,
            target,
            body: OutboundBody::Multipart {
                fields: Vec::new(),
                file: None,
            },
            request_id: None,
        }
    }

    /// Build a JSON `POST` to `target` from a typed payload.
    pub fn json<T: Serialize>(target: Url, payload: &T) -> Result<Self, ProxyError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| ProxyError::Encoding(format!("can not marshal JSON: {e}")))?;
        Ok(Self {
            method: Method::POST,
            target,
            body: OutboundBody::Json(value),
            request_id: None,
        })
    }

    /// Append a form field. Ignored for JSON specs.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let OutboundBody::Multipart { fields, .. } = &mut self.body {
            fields.push((name.into(), value.into()));
        }
        self
    }

    /// Attach the file part, replacing any previous one. Ignored for JSON specs.
    pub fn file(mut self, part: FilePart) -> Self {
        if let OutboundBody::Multipart { file, .. } = &mut self.body {
            *file = Some(part);
        }
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Correlation id forwarded to the downstream service as `x-request-id`.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn content_kind(&self) -> ContentKind {
        match self.body {
            OutboundBody::Multipart { .. } => ContentKind::Multipart,
            OutboundBody::Json(_) => ContentKind::Json,
        }
    }

    /// Form fields in insertion order. Empty for JSON specs.
    pub fn fields(&self) -> &[(String, String)] {
        match &self.body {
            OutboundBody::Multipart { fields, .. } => fields,
            OutboundBody::Json(_) => &[],
        }
    }

    pub fn file_part(&self) -> Option<&FilePart> {
        match &self.body {
            OutboundBody::Multipart { file, .. } => file.as_ref(),
            OutboundBody::Json(_) => None,
        }
    }

    pub fn json_payload(&self) -> Option<&serde_json::Value> {
        match &self.body {
            OutboundBody::Json(value) => Some(value),
            OutboundBody::Multipart { .. } => None,
        }
    }
}

/// Successful result of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw downstream bytes (images, audio).
    Binary(Bytes),
    /// A decoded structured result.
    Structured(serde_json::Value),
}

/// Why a pipeline stopped before producing a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The dispatch gate's deadline fired.
    DeadlineElapsed(Duration),
    /// The inbound request went away before an outcome was produced.
    CallerGone,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::DeadlineElapsed(after) => write!(f, "deadline elapsed after {after:?}"),
            CancelReason::CallerGone => write!(f, "caller disconnected"),
        }
    }
}

/// The single terminal result of one pipeline invocation.
#[derive(Debug)]
pub enum ProxyOutcome {
    Success(Payload),
    Failure(ProxyError),
    Cancelled(CancelReason),
}

impl ProxyOutcome {
    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProxyOutcome::Success(_) => "success",
            ProxyOutcome::Failure(_) => "failure",
            ProxyOutcome::Cancelled(_) => "cancelled",
        }
    }
}
