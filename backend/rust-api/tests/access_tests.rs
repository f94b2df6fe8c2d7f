use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use nextgoal_api::models::user::UserRole;
use serde_json::json;
use serial_test::serial;
use tower::ServiceExt;

mod common;

use common::{bearer_token, body_json, create_test_app};

fn get(uri: &str, auth: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, auth: Option<String>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
#[serial]
async fn protected_route_without_token_returns_401_envelope() {
    let app = create_test_app().await;

    let response = app.oneshot(get("/api/user", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Please sign in");
}

#[tokio::test]
#[serial]
async fn garbage_token_is_rejected() {
    let app = create_test_app().await;

    let response = app
        .oneshot(get(
            "/api/auth/current-user",
            Some("Bearer not-a-jwt".to_string()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn subscriber_cannot_reach_instructor_routes() {
    let app = create_test_app().await;
    let token = bearer_token("student-1", &[UserRole::Subscriber]);

    let response = app
        .oneshot(get("/api/course/ins", Some(token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Instructor role required");
}

#[tokio::test]
#[serial]
async fn instructor_cannot_reach_admin_routes() {
    let app = create_test_app().await;
    let token = bearer_token("teacher-1", &[UserRole::Subscriber, UserRole::Instructor]);

    for uri in ["/api/course/ad/course-inspect", "/api/user/ad", "/api/review/ad", "/api/qa/ad"] {
        let response = app
            .clone()
            .oneshot(get(uri, Some(token.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
#[serial]
async fn rejecting_a_course_requires_a_reason() {
    let app = create_test_app().await;
    let token = bearer_token("admin-1", &[UserRole::Admin]);

    let response = app
        .oneshot(send_json(
            "PUT",
            "/api/course/ad/course-new/some-course",
            Some(token),
            json!({ "isAccepted": false, "reasons": ["   "] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        "Rejecting a course requires at least one reason"
    );
}

#[tokio::test]
#[serial]
async fn register_validates_payload() {
    let app = create_test_app().await;

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/auth/register",
            None,
            json!({ "name": "Lan", "email": "not-an-email", "password": "secret1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Validation error"));
}

#[tokio::test]
#[serial]
async fn malformed_json_uses_the_error_envelope() {
    let app = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[serial]
async fn course_creation_rejects_short_names() {
    let app = create_test_app().await;
    let token = bearer_token("teacher-1", &[UserRole::Instructor]);

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/course/ins",
            Some(token),
            json!({ "name": "ab", "category": "c1", "description": "Learn things" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn media_upload_without_storage_is_refused() {
    std::env::remove_var("S3_BUCKET");
    let app = create_test_app().await;
    let token = bearer_token("teacher-1", &[UserRole::Instructor]);

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/course/ins/upload-image",
            Some(token),
            json!({ "image": "data:image/png;base64,iVBORw0KGgo=" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "File storage is not configured");
}

#[tokio::test]
#[serial]
async fn logout_clears_the_session_cookie() {
    let app = create_test_app().await;

    let response = app.oneshot(get("/api/auth/logout", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("Max-Age=0"));
}
