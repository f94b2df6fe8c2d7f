use axum::{extract::State, response::IntoResponse, Extension};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::{created, ok, AppError},
    extractors::AppJson,
    middlewares::auth::{JwtClaims, TOKEN_COOKIE},
    models::user::{
        ActivateRequest, ForgotPasswordRequest, LoginRequest, RegisterRequest,
        ResetPasswordRequest, UserProfile,
    },
    services::{auth_service::AuthService, user_service::UserService, AppState},
};

/// HTTP-only session cookie carrying the JWT.
pub(crate) fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie.secure)
        .same_site(state.config.cookie.parse_same_site())
        .max_age(time::Duration::days(state.config.token_ttl_days))
        .build()
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    tracing::info!("Registering new user: {}", req.email);

    let user = AuthService::new(&state).register(req).await?;
    Ok(created(
        "Registered. Check your email for the activation code",
        UserProfile::from(user),
    ))
}

/// POST /api/auth/activate
pub async fn activate(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ActivateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let user = AuthService::new(&state).activate(req).await?;
    Ok(ok("Account activated", UserProfile::from(user)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let (user, token) = AuthService::new(&state).login(req).await?;
    let jar = jar.add(session_cookie(&state, token));
    Ok((jar, ok("Logged in", UserProfile::from(user))))
}

/// GET /api/auth/logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    (jar, ok("Logged out", json!({})))
}

/// GET /api/auth/current-user
pub async fn current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserService::new(state.mongo.clone()).get(&claims.sub).await?;
    Ok(ok("Current user", UserProfile::from(user)))
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    AuthService::new(&state).forgot_password(&req.email).await?;
    Ok(ok("A reset code was sent to your email", json!({})))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    AuthService::new(&state).reset_password(req).await?;
    Ok(ok("Password has been reset", json!({})))
}
