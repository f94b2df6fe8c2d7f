use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use serial_test::serial;
use tower::ServiceExt;

mod common;

use common::{body_json, create_test_app, METRICS_CREDENTIALS};

#[tokio::test]
#[serial]
async fn metrics_require_basic_auth() {
    let app = create_test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn metrics_render_with_valid_credentials() {
    let app = create_test_app().await;
    let credentials = general_purpose::STANDARD.encode(METRICS_CREDENTIALS);

    // One request first so the HTTP counters have a sample.
    let _ = app
        .clone()
        .oneshot(Request::builder().uri("/api/user").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header(header::AUTHORIZATION, format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
#[serial]
async fn responses_carry_a_trace_id() {
    let app = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/category/unknown-route")
                .header("x-trace-id", "trace-abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-trace-id"], "trace-abc");
}

#[tokio::test]
#[serial]
async fn health_reports_dependencies() {
    let app = create_test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    assert!(status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["service"], "nextgoal-api");
    assert!(body["dependencies"]["mongodb"].is_object());
    assert!(body["dependencies"]["redis"].is_object());
}
