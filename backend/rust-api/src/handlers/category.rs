use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::{created, ok, AppError},
    extractors::AppJson,
    models::category::CategoryRequest,
    services::{category_service::CategoryService, AppState},
};

fn categories(state: &AppState) -> CategoryService {
    CategoryService::new(state.mongo.clone())
}

/// GET /api/category/public and GET /api/category/ad
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let items = categories(&state).list().await?;
    Ok(ok("Categories", items))
}

/// GET /api/category/public/{slug}
pub async fn get_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let category = categories(&state).get_by_slug(&slug).await?;
    Ok(ok("Category", category))
}

/// GET /api/category/ad/{category_id}
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let category = categories(&state).get(&category_id).await?;
    Ok(ok("Category", category))
}

/// POST /api/category/ad
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let category = categories(&state).create(req).await?;
    Ok(created("Category created", category))
}

/// PUT /api/category/ad/{category_id}/update
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<String>,
    AppJson(req): AppJson<CategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let category = categories(&state).update(&category_id, req).await?;
    Ok(ok("Category updated", category))
}

/// PUT /api/category/ad/{category_id}/delete
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    categories(&state).delete(&category_id).await?;
    Ok(ok("Category deleted", json!({})))
}
