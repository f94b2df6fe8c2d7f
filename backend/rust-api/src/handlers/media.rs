use axum::{extract::State, response::IntoResponse};
use serde_json::json;
use std::sync::Arc;

use crate::{
    errors::{created, ok, AppError},
    extractors::AppJson,
    models::course::{MediaRemoveRequest, MediaUploadRequest},
    services::{
        object_storage::{DataUrl, ObjectStorageClient},
        AppState,
    },
};

const IMAGE_FOLDER: &str = "images";
const PDF_FOLDER: &str = "documents";

fn storage(state: &AppState) -> Result<&ObjectStorageClient, AppError> {
    state.storage.as_ref().ok_or_else(|| {
        AppError::InvalidOperation("File storage is not configured".to_string())
    })
}

async fn upload(
    state: &AppState,
    folder: &str,
    req: MediaUploadRequest,
    accept: fn(&str) -> bool,
) -> Result<crate::models::course::MediaRef, AppError> {
    let storage = storage(state)?;
    let file = DataUrl::parse(&req.file)
        .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e)))?;
    if !accept(&file.content_type) {
        return Err(AppError::Validation(format!(
            "Unsupported file type: {}",
            file.content_type
        )));
    }
    storage
        .upload(folder, file)
        .await
        .map_err(|e| AppError::Upstream(format!("Upload failed: {:#}", e)))
}

async fn remove(state: &AppState, req: MediaRemoveRequest) -> Result<(), AppError> {
    let storage = storage(state)?;
    if req.key.trim().is_empty() {
        return Err(AppError::Validation("key is required".to_string()));
    }
    storage
        .delete(&req.key)
        .await
        .map_err(|e| AppError::Upstream(format!("Delete failed: {:#}", e)))
}

/// POST /api/course/ins/upload-image
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<MediaUploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let media = upload(&state, IMAGE_FOLDER, req, |mime| mime.starts_with("image/")).await?;
    Ok(created("Image uploaded", media))
}

/// POST /api/course/ins/remove-image
pub async fn remove_image(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<MediaRemoveRequest>,
) -> Result<impl IntoResponse, AppError> {
    remove(&state, req).await?;
    Ok(ok("Image removed", json!({})))
}

/// POST /api/course/ins/upload-pdf
pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<MediaUploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let media = upload(&state, PDF_FOLDER, req, |mime| mime == "application/pdf").await?;
    Ok(created("Document uploaded", media))
}

/// POST /api/course/ins/remove-pdf
pub async fn remove_pdf(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<MediaRemoveRequest>,
) -> Result<impl IntoResponse, AppError> {
    remove(&state, req).await?;
    Ok(ok("Document removed", json!({})))
}
