use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::{created, ok, AppError},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::review::{ReviewListQuery, ReviewRequest},
    services::{review_service::ReviewService, AppState},
};

/// GET /api/review/public/course/{course_id}
pub async fn list_for_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    Query(query): Query<ReviewListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let reviews = ReviewService::new(state.mongo.clone())
        .list_for_course(&course_id, query)
        .await?;
    Ok(ok("Reviews", reviews))
}

/// POST /api/review/course/{course_id}
pub async fn add_review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let review = ReviewService::new(state.mongo.clone())
        .add(&course_id, &claims.sub, req)
        .await?;
    Ok(created("Review added", review))
}

/// PUT /api/review/course/{course_id}/{review_id}/update
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, review_id)): Path<(String, String)>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let review = ReviewService::new(state.mongo.clone())
        .update(&course_id, &review_id, &claims.sub, req)
        .await?;
    Ok(ok("Review updated", review))
}

/// PUT /api/review/course/{course_id}/{review_id}/delete
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, review_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    ReviewService::new(state.mongo.clone())
        .delete(&course_id, &review_id, &claims.sub)
        .await?;
    Ok(ok("Review deleted", json!({})))
}

/// GET /api/review/ad
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let reviews = ReviewService::new(state.mongo.clone()).list_all(query).await?;
    Ok(ok("Reviews", reviews))
}
