use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::models::Envelope;
use crate::services::AppState;

/// Fixed-window counter: SET with expiry on first hit, INCR until the limit.
const RATE_LIMIT_SCRIPT: &str = r#"
    local key = KEYS[1]
    local limit = tonumber(ARGV[1])
    local window = tonumber(ARGV[2])

    local current = redis.call('GET', key)

    if current == false then
        redis.call('SET', key, 1, 'EX', window)
        return 1
    end

    current = tonumber(current)

    if current >= limit then
        return 0
    end

    redis.call('INCR', key)
    return 1
"#;

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Login,
    Register,
}

impl Bucket {
    fn name(&self) -> &'static str {
        match self {
            Bucket::Login => "login",
            Bucket::Register => "register",
        }
    }

    /// (limit, window seconds), overridable per deployment.
    fn limits(&self) -> (u32, u64) {
        let (env_key, default_limit, window) = match self {
            Bucket::Login => ("RATE_LIMIT_LOGIN_ATTEMPTS", 10, 300),
            Bucket::Register => ("RATE_LIMIT_REGISTER_ATTEMPTS", 5, 3600),
        };
        let limit = std::env::var(env_key)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(default_limit);
        (limit, window)
    }
}

pub fn extract_client_ip_from(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    // X-Forwarded-For, Forwarded, X-Real-IP, then the socket address
    if let Some(v) = headers.get("x-forwarded-for") {
        if let Ok(s) = v.to_str() {
            return s.split(',').next().unwrap_or(s).trim().to_string();
        }
    }

    if let Some(v) = headers.get("forwarded") {
        if let Ok(s) = v.to_str() {
            for part in s.split(';') {
                if let Some(value) = part.trim().strip_prefix("for=") {
                    return value.trim().trim_matches('"').to_string();
                }
            }
        }
    }

    if let Some(v) = headers.get("x-real-ip") {
        if let Ok(s) = v.to_str() {
            return s.trim().to_string();
        }
    }

    if let Some(ci) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return ci.0.ip().to_string();
    }

    "unknown".to_string()
}

fn rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

async fn check_rate_limit(
    redis: &redis::Client,
    key: &str,
    limit: u32,
    window_seconds: u64,
) -> anyhow::Result<bool> {
    let mut conn = redis.get_multiplexed_async_connection().await?;
    let allowed: u32 = redis::Script::new(RATE_LIMIT_SCRIPT)
        .key(key)
        .arg(limit)
        .arg(window_seconds)
        .invoke_async(&mut conn)
        .await?;
    Ok(allowed == 1)
}

async fn enforce(state: &AppState, request: Request, next: Next, bucket: Bucket) -> Response {
    if rate_limit_disabled() {
        return next.run(request).await;
    }

    let client_ip = extract_client_ip_from(request.headers(), request.extensions());
    let (limit, window) = bucket.limits();
    let key = format!("ratelimit:{}:{}", bucket.name(), client_ip);

    match check_rate_limit(&state.redis, &key, limit, window).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::warn!("{} rate limit exceeded for IP: {}", bucket.name(), client_ip);
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(Envelope::<()>::failure(
                    "Too many attempts, please try again later",
                )),
            )
                .into_response()
        }
        Err(e) => {
            // Redis outage must not lock users out
            tracing::warn!("{} rate limit check failed, allowing request: {}", bucket.name(), e);
            next.run(request).await
        }
    }
}

/// 10 attempts per 5 minutes per IP
pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state, request, next, Bucket::Login).await
}

/// 5 registrations per hour per IP
pub async fn register_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state, request, next, Bucket::Register).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_client_ip_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4, 10.0.0.1".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts), "1.2.3.4");
    }

    #[test]
    fn test_extract_client_ip_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", "for=5.6.7.8;proto=http".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts), "5.6.7.8");
    }

    #[test]
    fn test_extract_client_ip_connect_info() {
        let headers = HeaderMap::new();
        let mut exts = axum::http::Extensions::new();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        exts.insert(ConnectInfo(addr));
        assert_eq!(extract_client_ip_from(&headers, &exts), "127.0.0.1");
    }

    #[test]
    fn test_unknown_without_any_source() {
        let headers = HeaderMap::new();
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts), "unknown");
    }

    #[test]
    #[serial_test::serial]
    fn test_limits_can_be_overridden() {
        std::env::set_var("RATE_LIMIT_LOGIN_ATTEMPTS", "3");
        assert_eq!(Bucket::Login.limits(), (3, 300));
        std::env::remove_var("RATE_LIMIT_LOGIN_ATTEMPTS");
        assert_eq!(Bucket::Login.limits(), (10, 300));
        assert_eq!(Bucket::Register.limits(), (5, 3600));
    }
}
