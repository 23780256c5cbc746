//! End-to-end tests for the `/ml/*` proxy routes against mock downstreams.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

mod common;
use common::{MockResponse, RecordedRequest};

/// Content of the multipart part named `name`, if present.
fn multipart_part<'a>(body: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let marker = format!("name=\"{name}\"");
    let start = body
        .windows(marker.len())
        .position(|w| w == marker.as_bytes())?;
    let rest = &body[start..];
    let content = rest.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let rest = &rest[content..];
    let end = rest.windows(4).position(|w| w == b"\r\n--")?;
    Some(&rest[..end])
}

#[tokio::test]
async fn test_image_round_trip() {
    let seen: Arc<Mutex<Option<RecordedRequest>>> = Arc::new(Mutex::new(None));
    let recorder = seen.clone();
    let backend = common::start_programmable_backend(move |request: RecordedRequest| {
        let recorder = recorder.clone();
        async move {
            let echoed = multipart_part(&request.body, "filedata").unwrap_or_default().to_vec();
            *recorder.lock().unwrap() = Some(request);
            MockResponse::ok("image/png", echoed)
        }
    })
    .await;
    let gateway = common::spawn_gateway(common::config_for(backend)).await;

    let form = Form::new()
        .text("message", "hello")
        .part("image", Part::bytes(b"\x89PNG\n".to_vec()).file_name("cat.png"));
    let response = common::client()
        .post(gateway.url("/ml/image"))
        .header("x-request-id", "trace-me")
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(&response.bytes().await.unwrap()[..], b"\x89PNG\n");

    let request = seen.lock().unwrap().take().unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/image");
    assert_eq!(request.header("x-request-id"), Some("trace-me"));
    assert_eq!(request.header("accept-encoding"), Some("identity"));
    assert!(request
        .header("content-type")
        .unwrap()
        .starts_with("multipart/form-data; boundary="));
    assert_eq!(multipart_part(&request.body, "message"), Some(&b"hello"[..]));
    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains("filename=\"test.png\""));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_stalled_downstream_times_out_and_is_released() {
    let (backend, closed) = common::start_stalling_backend().await;
    let mut config = common::config_for(backend);
    config.timeouts.media_secs = 2;
    let gateway = common::spawn_gateway(config).await;

    let form = Form::new()
        .text("message", "slow")
        .part("image", Part::bytes(b"pixels".to_vec()).file_name("a.png"));
    let started = Instant::now();
    let response = common::client()
        .post(gateway.url("/ml/image"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "timeout");
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");

    let deadline = Instant::now() + Duration::from_secs(3);
    while !closed.load(Ordering::SeqCst) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(closed.load(Ordering::SeqCst), "downstream connection still held");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_timeseries_forecast_envelope() {
    let backend = common::start_programmable_backend(|request: RecordedRequest| async move {
        assert_eq!(request.path, "/ts");
        assert_eq!(multipart_part(&request.body, "predictor"), Some(&b"arima"[..]));
        assert_eq!(multipart_part(&request.body, "target"), Some(&b"sales"[..]));
        MockResponse::ok(
            "application/json",
            r#"{"datas":["d1"],"values":[1.0],"futures":["d2"],"predictions":[2.0]}"#,
        )
    })
    .await;
    let gateway = common::spawn_gateway(common::config_for(backend)).await;

    let form = Form::new()
        .text("predictor", "arima")
        .text("target", "sales")
        .part("ts", Part::bytes(b"date,sales\nd1,1.0\n".to_vec()).file_name("s.csv"));
    let response = common::client()
        .post(gateway.url("/ml/ts"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["arrays"]["futures"][0], "d2");
    assert_eq!(body["arrays"]["predictions"][0], 2.0);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_malformed_timeseries_is_decode_error() {
    let backend = common::start_programmable_backend(|_request: RecordedRequest| async {
        MockResponse::ok("application/json", "{\"datas\": [")
    })
    .await;
    let gateway = common::spawn_gateway(common::config_for(backend)).await;

    let form = Form::new()
        .text("predictor", "arima")
        .text("target", "sales")
        .part("ts", Part::bytes(b"a,b\n".to_vec()).file_name("s.csv"));
    let response = common::client()
        .post(gateway.url("/ml/ts"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "can not decode response");
    assert!(body["error"].as_str().unwrap().contains("time-series"));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_missing_file_never_reaches_downstream() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = common::start_programmable_backend(move |_request: RecordedRequest| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { MockResponse::ok("image/png", "x") }
    })
    .await;
    let gateway = common::spawn_gateway(common::config_for(backend)).await;

    let form = Form::new().text("message", "no picture");
    let response = common::client()
        .post(gateway.url("/ml/image"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "bad request");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_message_routes_forward_json() {
    let backend = common::start_programmable_backend(|request: RecordedRequest| async move {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["message"], "a quiet melody");
        let media = if request.path == "/track" { "audio/wav" } else { "image/png" };
        MockResponse::ok(media, request.path.into_bytes())
    })
    .await;
    let gateway = common::spawn_gateway(common::config_for(backend)).await;
    let client = common::client();

    for (route, media) in [("/ml/message", "image/png"), ("/ml/track", "audio/wav")] {
        let response = client
            .post(gateway.url(route))
            .json(&serde_json::json!({"message": "a quiet melody"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], media);
        let body = response.bytes().await.unwrap();
        assert_eq!(&body[..], route.trim_start_matches("/ml").as_bytes());
    }

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = common::start_programmable_backend(move |request: RecordedRequest| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { MockResponse::ok("image/png", request.body) }
    })
    .await;
    let gateway = Arc::new(common::spawn_gateway(common::config_for(backend)).await);
    let client = common::client();

    let mut handles = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        let url = gateway.url("/ml/message");
        handles.push(tokio::spawn(async move {
            let response = client
                .post(url)
                .json(&serde_json::json!({ "message": format!("prompt {i}") }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let echoed: serde_json::Value =
                serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
            assert_eq!(echoed["message"], format!("prompt {i}"));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 8);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown_stops_server() {
    let addr = common::unused_addr().await;
    let gateway = common::spawn_gateway(common::config_for(addr)).await;

    let response = common::client().get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    gateway.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), gateway.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
