use axum::{extract::State, response::IntoResponse, Extension};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::{ok, AppError},
    extractors::AppJson,
    handlers::auth::session_cookie,
    middlewares::auth::JwtClaims,
    models::user::{BecomeInstructorRequest, UserProfile},
    services::{
        auth_service::AuthService, instructor_service::InstructorService,
        user_service::UserService, AppState,
    },
};

/// POST /api/instructor/become-instructor
///
/// Roles live in the token, so a fresh cookie is issued with the new role.
pub async fn become_instructor(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    jar: CookieJar,
    AppJson(req): AppJson<BecomeInstructorRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let user = InstructorService::new(&state)
        .become_instructor(&claims.sub, req)
        .await?;
    let token = AuthService::new(&state).issue_token(&user)?;
    let jar = jar.add(session_cookie(&state, token));
    Ok((jar, ok("You are now an instructor", UserProfile::from(user))))
}

/// POST /api/instructor/stripe/onboard
pub async fn stripe_onboard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, AppError> {
    let url = InstructorService::new(&state)
        .stripe_onboarding_link(&claims.sub)
        .await?;
    Ok(ok("Stripe onboarding link", json!({ "url": url })))
}

/// POST /api/instructor/stripe/status
pub async fn stripe_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, AppError> {
    let user = InstructorService::new(&state)
        .stripe_account_status(&claims.sub)
        .await?;
    Ok(ok("Stripe account is ready", UserProfile::from(user)))
}

/// GET /api/instructor/current
pub async fn current_instructor(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserService::new(state.mongo.clone()).get(&claims.sub).await?;
    Ok(ok("Current instructor", UserProfile::from(user)))
}
