//! Citizen application endpoints, plus admin listing and review.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::dtos::applications::{
    CreateApplicationRequest, ListApplicationsQuery, ReviewRequest, UpdateApplicationRequest,
};
use crate::dtos::Paginated;
use crate::middleware::AuthUser;
use crate::models::Application;
use crate::utils::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

/// POST /applications
pub async fn create_draft(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    let app = state.applications.create_draft(&user, req).await?;
    Ok((StatusCode::CREATED, Json(app)))
}

/// GET /applications/mine
pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListApplicationsQuery>,
) -> Result<Json<Paginated<Application>>, AppError> {
    let page = state.applications.list_mine(&user, &query).await?;
    Ok(Json(page))
}

/// GET /applications/:id
pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(app_id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    let app = state.applications.get(&user, app_id).await?;
    Ok(Json(app))
}

/// PUT /applications/:id
pub async fn update_draft(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(app_id): Path<Uuid>,
    Json(req): Json<UpdateApplicationRequest>,
) -> Result<Json<Application>, AppError> {
    let app = state.applications.update_draft(&user, app_id, req).await?;
    Ok(Json(app))
}

/// POST /applications/:id/submit
pub async fn submit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(app_id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    let app = state.applications.submit(&user, app_id).await?;
    Ok(Json(app))
}

/// DELETE /applications/:id
pub async fn delete_draft(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(app_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.applications.delete_draft(&user, app_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/applications
pub async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<ListApplicationsQuery>,
) -> Result<Json<Paginated<Application>>, AppError> {
    let page = state.applications.admin_list(&query).await?;
    Ok(Json(page))
}

/// PATCH /admin/applications/:id/status
pub async fn review(
    State(state): State<AppState>,
    Path(app_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ReviewRequest>,
) -> Result<Json<Application>, AppError> {
    let app = state.applications.review(app_id, req).await?;
    Ok(Json(app))
}
