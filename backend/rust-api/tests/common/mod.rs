#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::Response,
    Router,
};
use nextgoal_api::{
    config::Config,
    create_router,
    middlewares::auth::JwtClaims,
    models::user::UserRole,
    services::AppState,
};
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";
pub const TEST_VNPAY_SECRET: &str = "integration-test-vnpay";
pub const METRICS_CREDENTIALS: &str = "scraper:test-password";

fn configure_env() {
    std::env::set_var("APP_ENV", "test");
    std::env::set_var("SKIP_ROOT_ENV", "1");
    std::env::set_var("RATE_LIMIT_DISABLED", "1");
    std::env::set_var("EMAIL_SEND_DISABLED", "1");
    std::env::set_var("JWT_SECRET", TEST_JWT_SECRET);
    std::env::set_var("VNP_HASH_SECRET", TEST_VNPAY_SECRET);
    std::env::set_var("CLIENT_URL", "http://localhost:3000");
    std::env::set_var("METRICS_AUTH", METRICS_CREDENTIALS);
    if std::env::var("MONGO_DATABASE").is_err() {
        std::env::set_var("MONGO_DATABASE", "nextgoal_test");
    }
}

/// State backed by lazily-connecting clients; nothing is dialled until a handler queries.
pub async fn create_test_state() -> Arc<AppState> {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    configure_env();
    let config = Config::load().expect("Failed to load test configuration");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to create test MongoDB client");
    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    Arc::new(
        AppState::new(config, mongo_client, redis_client)
            .expect("Failed to initialize test app state"),
    )
}

pub async fn create_test_app() -> Router {
    create_router(create_test_state().await)
}

/// `Authorization` header value for a user holding `roles`.
pub fn bearer_token(user_id: &str, roles: &[UserRole]) -> String {
    let jwt = nextgoal_api::middlewares::auth::JwtService::new(TEST_JWT_SECRET);
    let token = jwt
        .generate_token(&JwtClaims::new(user_id, roles, 1))
        .expect("Failed to sign test token");
    format!("Bearer {}", token)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}
