//! Response shaping.
//!
//! # Responsibilities
//! - JSON envelopes for errors (`{message, error}`) and results (`{status, payload}`)
//! - Map proxy errors to status codes
//! - Turn a pipeline payload into the route's response
//!
//! # Design Decisions
//! - Every error path answers JSON; only successful media routes answer binary
//! - The request ID header is added by middleware, not here

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::proxy::{Payload, ProxyError};

/// Error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub payload: T,
}

pub fn error_response(status: StatusCode, message: impl Into<String>, error: Option<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
            error,
        }),
    )
        .into_response()
}

pub fn success<T: Serialize>(payload: T) -> Response {
    Json(Envelope {
        status: "success",
        payload,
    })
    .into_response()
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.kind(), Some(self.to_string()))
    }
}

/// Shape a successful pipeline payload.
///
/// Binary payloads are sent as-is under `media_type`; structured payloads are
/// wrapped as `{"status": "success", "arrays": ...}`.
pub fn payload_response(payload: Payload, media_type: Option<&'static str>) -> Response {
    match payload {
        Payload::Binary(bytes) => {
            let content_type = media_type.unwrap_or("application/octet-stream");
            (
                [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
                bytes,
            )
                .into_response()
        }
        Payload::Structured(arrays) => Json(serde_json::json!({
            "status": "success",
            "arrays": arrays,
        }))
        .into_response(),
    }
}

/// Fallback for unknown routes.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Bytes};
    use std::time::Duration;

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_timeout_envelope() {
        let err = ProxyError::Timeout {
            target: "http://ml:9090/image".to_string(),
            waited: Duration::from_secs(2),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(response).await;
        assert_eq!(body["message"], "timeout");
        assert!(body["error"].as_str().unwrap().starts_with("timeout from server: http://ml:9090/image"));
    }

    #[tokio::test]
    async fn test_parameter_error_is_400() {
        let response = ProxyError::parameter("image", "missing file part").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "bad request");
    }

    #[tokio::test]
    async fn test_binary_payload_keeps_bytes() {
        let response = payload_response(Payload::Binary(Bytes::from_static(b"12345")), Some("image/png"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"12345");
    }

    #[tokio::test]
    async fn test_structured_payload_envelope() {
        let arrays = serde_json::json!({"datas": ["2024-01-01"], "values": [1.0]});
        let body = json_body(payload_response(Payload::Structured(arrays.clone()), None)).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["arrays"], arrays);
    }

    #[tokio::test]
    async fn test_error_without_detail_omits_field() {
        let body = json_body(error_response(StatusCode::UNAUTHORIZED, "not authorized", None)).await;
        assert_eq!(body, serde_json::json!({"message": "not authorized"}));
    }
}
