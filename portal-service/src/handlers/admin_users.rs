//! Admin user management endpoints.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::dtos::admin::{ListUsersQuery, UpdateUserRequest};
use crate::dtos::Paginated;
use crate::middleware::AuthUser;
use crate::models::SanitizedUser;
use crate::utils::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Paginated<SanitizedUser>>, AppError> {
    let page = state.admin.list_users(&query).await?;
    Ok(Json(page))
}

/// GET /admin/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<SanitizedUser>, AppError> {
    let user = state.admin.get_user(user_id).await?;
    Ok(Json(user))
}

/// PATCH /admin/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<SanitizedUser>, AppError> {
    let user = state.admin.update_user(&actor, user_id, req).await?;
    Ok(Json(user))
}

/// DELETE /admin/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.admin.delete_user(&actor, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
