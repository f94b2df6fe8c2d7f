use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use serde_json::json;
use std::{future::Future, sync::Arc, time::Duration};

use crate::metrics;
use crate::services::AppState;

#[derive(Debug, Serialize)]
struct DependencyHealth {
    healthy: bool,
    detail: String,
}

impl DependencyHealth {
    /// Runs `probe` under `limit`; a timeout counts as a failure.
    async fn probe<F, E>(name: &str, limit: Duration, probe: F) -> Self
    where
        F: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(limit, probe).await {
            Ok(Ok(())) => Self {
                healthy: true,
                detail: format!("{} reachable", name),
            },
            Ok(Err(e)) => {
                tracing::warn!("{} health probe failed: {}", name, e);
                Self {
                    healthy: false,
                    detail: format!("{} error: {}", name, e),
                }
            }
            Err(_) => Self {
                healthy: false,
                detail: format!("{} timed out after {}ms", name, limit.as_millis()),
            },
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mongo = DependencyHealth::probe("MongoDB", Duration::from_secs(1), async {
        state
            .mongo
            .run_command(mongodb::bson::doc! { "ping": 1 })
            .await
            .map(|_| ())
    });
    let redis = DependencyHealth::probe("Redis", Duration::from_millis(500), async {
        let mut conn = state.redis.get_multiplexed_async_connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
    });
    let (mongo, redis) = tokio::join!(mongo, redis);

    let healthy = mongo.healthy && redis.healthy;
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "nextgoal-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": { "mongodb": mongo, "redis": redis },
        })),
    )
}

/// GET /metrics
pub async fn metrics_handler() -> Result<String, StatusCode> {
    metrics::render_metrics().map_err(|e| {
        tracing::error!("Failed to render metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// HTTP Basic auth for /metrics, credentials from `METRICS_AUTH` (`user:password`).
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|encoded| general_purpose::STANDARD.decode(encoded).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok());

    match presented {
        Some(credentials) if credentials == expected => {}
        Some(_) => {
            tracing::warn!("Rejected metrics scrape with bad credentials");
            return Err(StatusCode::UNAUTHORIZED);
        }
        None => return Err(StatusCode::UNAUTHORIZED),
    }

    Ok(next.run(request).await)
}

pub mod auth;
pub mod banner;
pub mod category;
pub mod course;
pub mod instructor;
pub mod media;
pub mod payment;
pub mod qa;
pub mod review;
pub mod user;
