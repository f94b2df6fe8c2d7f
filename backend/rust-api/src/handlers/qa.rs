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
    models::qa::{QaListQuery, QaRequest, QaUpdateRequest},
    services::{qa_service::QaService, AppState},
};

/// GET /api/qa/course/{course_id}
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    Query(query): Query<QaListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let threads = QaService::new(state.mongo.clone())
        .list_threads(&course_id, &claims.sub, query)
        .await?;
    Ok(ok("Questions", threads))
}

/// GET /api/qa/course/{course_id}/qa/{qa_id}
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path((course_id, qa_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (thread, replies) = QaService::new(state.mongo.clone())
        .get_thread(&course_id, &qa_id)
        .await?;
    Ok(ok("Question", json!({ "qa": thread, "replies": replies })))
}

/// POST /api/qa/course/{course_id}/lesson/{lesson_id}
pub async fn add_qa(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
    AppJson(req): AppJson<QaRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let qa = QaService::new(state.mongo.clone())
        .add(&course_id, &lesson_id, &claims.sub, req)
        .await?;
    Ok(created("Posted", qa))
}

/// PUT /api/qa/course/{course_id}/lesson/{lesson_id}/{qa_id}/update
pub async fn update_qa(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id, qa_id)): Path<(String, String, String)>,
    AppJson(req): AppJson<QaUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let qa = QaService::new(state.mongo.clone())
        .update(&course_id, &lesson_id, &qa_id, &claims.sub, req)
        .await?;
    Ok(ok("Updated", qa))
}

/// PUT /api/qa/course/{course_id}/lesson/{lesson_id}/{qa_id}/delete
pub async fn delete_qa(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id, qa_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    QaService::new(state.mongo.clone())
        .delete(&course_id, &lesson_id, &qa_id, &claims.sub)
        .await?;
    Ok(ok("Deleted", json!({})))
}

/// GET /api/qa/ad
pub async fn list_all(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let items = QaService::new(state.mongo.clone()).list_all().await?;
    Ok(ok("Questions and answers", items))
}
