use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::{created, ok, AppError},
    extractors::AppJson,
    models::banner::{BannerListQuery, BannerRequest},
    services::{banner_service::BannerService, AppState},
};

/// GET /api/banner/public
pub async fn list_banners(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BannerListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let banners = BannerService::new(state.mongo.clone()).list(query).await?;
    Ok(ok("Banners", banners))
}

/// GET /api/banner/public/{banner_id}
pub async fn get_banner(
    State(state): State<Arc<AppState>>,
    Path(banner_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let banner = BannerService::new(state.mongo.clone()).get(&banner_id).await?;
    Ok(ok("Banner", banner))
}

/// POST /api/banner/ad
pub async fn create_banner(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<BannerRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let banner = BannerService::new(state.mongo.clone()).create(req).await?;
    Ok(created("Banner created", banner))
}

/// PUT /api/banner/ad/{banner_id}/update
pub async fn update_banner(
    State(state): State<Arc<AppState>>,
    Path(banner_id): Path<String>,
    AppJson(req): AppJson<BannerRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let banner = BannerService::new(state.mongo.clone())
        .update(&banner_id, req)
        .await?;
    Ok(ok("Banner updated", banner))
}

/// PUT /api/banner/ad/{banner_id}/delete
pub async fn delete_banner(
    State(state): State<Arc<AppState>>,
    Path(banner_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let banner = BannerService::new(state.mongo.clone())
        .delete(&banner_id)
        .await?;
    Ok(ok("Banner deleted", banner))
}
