use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::AppError;
use crate::models::user::UserRole;
use crate::services::AppState;

pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,        // user id
    pub roles: Vec<UserRole>,
    pub exp: usize,
    pub iat: usize,
}

impl JwtClaims {
    pub fn new(user_id: &str, roles: &[UserRole], ttl_days: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            roles: roles.to_vec(),
            exp: (now + ttl_days * 24 * 3600) as usize,
            iat: now as usize,
        }
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Failed to issue token")]
    Encoding,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::Encoding)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Token from the `token` cookie, falling back to `Authorization: Bearer`.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
}

/// Requires a valid token and stores its claims in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Please sign in".to_string()))?;

    let claims = state.jwt.validate_token(&token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        AppError::Unauthorized("Invalid or expired session".to_string())
    })?;

    tracing::debug!(user_id = %claims.sub, "Authenticated request");
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Attaches claims when a valid token is present; never rejects.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(request.headers()) {
        if let Ok(claims) = state.jwt.validate_token(&token) {
            request.extensions_mut().insert(claims);
        }
    }
    next.run(request).await
}

fn require_role(request: &Request, role: UserRole) -> Result<(), AppError> {
    match request.extensions().get::<JwtClaims>() {
        Some(claims) if claims.has_role(role) => Ok(()),
        Some(claims) => {
            tracing::warn!(user_id = %claims.sub, "Access denied: {} role required", role.as_str());
            Err(AppError::Forbidden(format!("{} role required", role.as_str())))
        }
        None => Err(AppError::Unauthorized("Please sign in".to_string())),
    }
}

pub async fn instructor_guard_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&request, UserRole::Instructor)?;
    Ok(next.run(request).await)
}

pub async fn admin_guard_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&request, UserRole::Admin)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = JwtService::new("test-secret");
        let claims = JwtClaims::new("user123", &[UserRole::Subscriber, UserRole::Instructor], 7);

        let token = service.generate_token(&claims).unwrap();
        let validated = service.validate_token(&token).unwrap();

        assert_eq!(validated.sub, "user123");
        assert!(validated.has_role(UserRole::Instructor));
        assert!(!validated.has_role(UserRole::Admin));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let token = JwtService::new("one")
            .generate_token(&JwtClaims::new("u", &[UserRole::Subscriber], 1))
            .unwrap();
        assert!(matches!(
            JwtService::new("two").validate_token(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let service = JwtService::new("s");
        let mut claims = JwtClaims::new("u", &[UserRole::Subscriber], 1);
        claims.exp = (chrono::Utc::now().timestamp() - 3600) as usize;
        let token = service.generate_token(&claims).unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn cookie_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("theme=dark; token=abc"));
        headers.insert("authorization", HeaderValue::from_static("Bearer xyz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));

        headers.remove("cookie");
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));
    }
}
