//! Presigned upload/download endpoints for application attachments.

use axum::extract::{Json, Query, State};

use crate::dtos::uploads::{PresignDownloadQuery, PresignResponse, PresignUploadRequest};
use crate::middleware::AuthUser;
use crate::utils::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

/// POST /uploads/presign
pub async fn presign_upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<PresignUploadRequest>,
) -> Result<Json<PresignResponse>, AppError> {
    let response = state.storage.presign_upload(&user, &req).await?;
    Ok(Json(response))
}

/// GET /uploads/presign-download?key=...
pub async fn presign_download(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PresignDownloadQuery>,
) -> Result<Json<PresignResponse>, AppError> {
    let response = state.storage.presign_download(&user, &query.key).await?;
    Ok(Json(response))
}
