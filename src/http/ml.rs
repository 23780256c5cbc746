//! ML proxy handlers.
//!
//! # Responsibilities
//! - Extract and validate inbound parameters (400 before any outbound call)
//! - Build the OutboundSpec for the route's downstream
//! - Await the route's DispatchGate and shape the result
//!
//! # Design Decisions
//! - Missing text fields forward as empty strings; a missing file is an error
//! - The inbound request ID is forwarded downstream
//! - A dropped handler future (client gone) cancels the pipeline via the gate

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::http::request::RequestIdExt;
use crate::http::response::payload_response;
use crate::http::server::AppState;
use crate::proxy::{FilePart, OutboundSpec, ProxyError};
use crate::routing::{Extraction, MlRoute, OUTBOUND_FILE_FIELD};

/// JSON body of `/ml/message` and `/ml/track`, forwarded unchanged.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageBody {
    pub message: String,
}

/// A parsed upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Bytes>,
}

pub async fn image(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ProxyError> {
    forward_upload(&state, MlRoute::Image, &headers, multipart).await
}

pub async fn melody(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ProxyError> {
    forward_upload(&state, MlRoute::Melody, &headers, multipart).await
}

pub async fn timeseries(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ProxyError> {
    forward_upload(&state, MlRoute::TimeSeries, &headers, multipart).await
}

pub async fn message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<MessageBody>, JsonRejection>,
) -> Result<Response, ProxyError> {
    forward_message(&state, MlRoute::Message, &headers, body).await
}

pub async fn track(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<MessageBody>, JsonRejection>,
) -> Result<Response, ProxyError> {
    forward_message(&state, MlRoute::Track, &headers, body).await
}

async fn forward_upload(
    state: &AppState,
    route: MlRoute,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ProxyError> {
    let Extraction::Upload { fields, file_field, filename } = route.extraction() else {
        return Err(ProxyError::parameter("body", "route expects a JSON body"));
    };

    let multipart = multipart.map_err(|e| ProxyError::parameter("body", e.body_text()))?;
    let mut form = read_upload(multipart, fields, file_field).await?;
    let data = form
        .file
        .take()
        .ok_or_else(|| ProxyError::parameter(file_field, "missing file part"))?;

    let mut spec = OutboundSpec::multipart(state.ml.target(route).clone());
    for name in fields {
        let value = form.fields.remove(*name).unwrap_or_default();
        spec = spec.field(*name, value);
    }
    spec = spec.file(FilePart::new(OUTBOUND_FILE_FIELD, filename, data));

    dispatch(state, route, headers, spec).await
}

async fn forward_message(
    state: &AppState,
    route: MlRoute,
    headers: &HeaderMap,
    body: Result<Json<MessageBody>, JsonRejection>,
) -> Result<Response, ProxyError> {
    let Json(body) = body.map_err(|e| ProxyError::parameter("body", e.body_text()))?;
    let spec = OutboundSpec::json(state.ml.target(route).clone(), &body)?;
    dispatch(state, route, headers, spec).await
}

async fn dispatch(
    state: &AppState,
    route: MlRoute,
    headers: &HeaderMap,
    mut spec: OutboundSpec,
) -> Result<Response, ProxyError> {
    if let Some(id) = headers.request_id() {
        spec = spec.with_request_id(id);
    }
    let payload = state.ml.gate(route).dispatch(spec).await?;
    Ok(payload_response(payload, route.media_type()))
}

/// Read the listed text fields and the file part from a multipart form.
///
/// Unlisted parts are skipped. If a name repeats, the last part wins.
pub async fn read_upload(
    mut multipart: Multipart,
    fields: &[&str],
    file_field: &str,
) -> Result<UploadForm, ProxyError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ProxyError::parameter("body", e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == file_field {
            let data = field
                .bytes()
                .await
                .map_err(|e| ProxyError::parameter(file_field, e.body_text()))?;
            form.file = Some(data);
        } else if fields.contains(&name.as_str()) {
            let value = field
                .text()
                .await
                .map_err(|e| ProxyError::parameter(name.clone(), e.body_text()))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use crate::http::server::tests::{body_bytes, body_json, json_request, multipart_request, send, test_state};
    use crate::proxy::pipeline::tests::{Behavior, ScriptedTransport};
    use axum::http::{header, Method, StatusCode};

    const SERIES: &[u8] =
        br#"{"datas":["2024-01-01"],"values":[1.0],"futures":["2024-01-02"],"predictions":[2.5]}"#;

    #[tokio::test]
    async fn test_image_returns_png_bytes() {
        let transport = ScriptedTransport::new(Behavior::Respond(StatusCode::OK, b"12345"));
        let state = test_state(transport.clone());

        let request = multipart_request("/ml/image", &[("message", "hello")], Some(("image", b"abcde")));
        let response = send(&state, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(&body_bytes(response).await[..], b"12345");
        assert_eq!(transport.calls(), 1);
        let sent = transport.last_content_type.lock().unwrap().clone().unwrap();
        assert!(sent.starts_with("multipart/form-data; boundary="));
    }

    #[tokio::test]
    async fn test_missing_file_never_dispatches() {
        let transport = ScriptedTransport::new(Behavior::Respond(StatusCode::OK, b"x"));
        let state = test_state(transport.clone());

        for uri in ["/ml/image", "/ml/melody", "/ml/ts"] {
            let request = multipart_request(uri, &[("message", "hello")], None);
            let response = send(&state, request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body_json(response).await["message"], "bad request");
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_wrong_file_field_is_rejected() {
        let transport = ScriptedTransport::new(Behavior::Respond(StatusCode::OK, b"x"));
        let state = test_state(transport.clone());

        let request = multipart_request("/ml/melody", &[], Some(("image", b"riff")));
        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_rejected() {
        let transport = ScriptedTransport::new(Behavior::Respond(StatusCode::OK, b"x"));
        let state = test_state(transport.clone());

        let response = send(&state, json_request(Method::POST, "/ml/image", r#"{"message":"hi"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_track_forwards_json() {
        let transport = ScriptedTransport::new(Behavior::Respond(StatusCode::OK, b"RIFF"));
        let state = test_state(transport.clone());

        let response = send(&state, json_request(Method::POST, "/ml/track", r#"{"message":"jazz"}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
        assert_eq!(
            transport.last_content_type.lock().unwrap().as_deref(),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_malformed_json_never_dispatches() {
        let transport = ScriptedTransport::new(Behavior::Respond(StatusCode::OK, b"x"));
        let state = test_state(transport.clone());

        for body in ["{not json", r#"{"text":"no message field"}"#] {
            let response = send(&state, json_request(Method::POST, "/ml/message", body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_timeseries_envelope() {
        let transport = ScriptedTransport::new(Behavior::Respond(StatusCode::OK, SERIES));
        let state = test_state(transport);

        let request = multipart_request(
            "/ml/ts",
            &[("predictor", "date"), ("target", "price")],
            Some(("ts", b"date,price\n2024-01-01,1.0\n")),
        );
        let body = body_json(send(&state, request).await).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["arrays"]["predictions"][0], 2.5);
        assert_eq!(body["arrays"]["futures"][0], "2024-01-02");
    }

    #[tokio::test]
    async fn test_timeseries_decode_failure_is_500() {
        let transport = ScriptedTransport::new(Behavior::Respond(StatusCode::OK, b"{\"datas\": ["));
        let state = test_state(transport);

        let request = multipart_request("/ml/ts", &[], Some(("ts", b"a,b")));
        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "can not decode response");
    }

    #[tokio::test]
    async fn test_downstream_error_status_is_500() {
        let transport = ScriptedTransport::new(Behavior::Respond(StatusCode::SERVICE_UNAVAILABLE, b"overloaded"));
        let state = test_state(transport);

        let response = send(&state, json_request(Method::POST, "/ml/message", r#"{"message":"hi"}"#)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "response error");
        assert!(body["error"].as_str().unwrap().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_transport_panic_is_contained() {
        let transport = ScriptedTransport::new(Behavior::Panic);
        let state = test_state(transport);

        let response = send(&state, json_request(Method::POST, "/ml/track", r#"{"message":"hi"}"#)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "internal error");
    }
}
