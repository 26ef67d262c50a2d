//! Public settings plus admin settings and service configuration endpoints.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};

use crate::dtos::settings::{
    CreateAddonServiceRequest, CreateCustomServiceRequest, PublicSettings,
    UpdateAddonServiceRequest, UpdateCustomServiceRequest, UpdateSettingsRequest,
};
use crate::models::{CustomServiceConfig, FormConfig, Settings};
use crate::utils::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

/// GET /settings: branding, FAQs, and enabled services, unauthenticated.
pub async fn public_settings(
    State(state): State<AppState>,
) -> Result<Json<PublicSettings>, AppError> {
    let settings = state.settings.get_or_create().await?;
    Ok(Json(PublicSettings::from(settings)))
}

/// GET /admin/settings
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, AppError> {
    let settings = state.settings.get_or_create().await?;
    Ok(Json(settings))
}

/// PATCH /admin/settings
pub async fn update_settings(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<UpdateSettingsRequest>,
) -> Result<Json<Settings>, AppError> {
    let settings = state.settings.update(req).await?;
    Ok(Json(settings))
}

/// POST /admin/settings/custom-services
pub async fn create_custom_service(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateCustomServiceRequest>,
) -> Result<(StatusCode, Json<CustomServiceConfig>), AppError> {
    let service = state.settings.create_custom_service(req).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// PATCH /admin/settings/custom-services/:service_id
pub async fn update_custom_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateCustomServiceRequest>,
) -> Result<Json<CustomServiceConfig>, AppError> {
    let service = state
        .settings
        .update_custom_service(&service_id, req)
        .await?;
    Ok(Json(service))
}

/// DELETE /admin/settings/custom-services/:service_id
pub async fn delete_custom_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.settings.delete_custom_service(&service_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/settings/addon-services
pub async fn create_addon_service(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateAddonServiceRequest>,
) -> Result<(StatusCode, Json<FormConfig>), AppError> {
    let form = state.settings.create_addon_service(req).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

/// PATCH /admin/settings/addon-services/:service_id
pub async fn update_addon_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateAddonServiceRequest>,
) -> Result<Json<FormConfig>, AppError> {
    let form = state.settings.update_addon_service(&service_id, req).await?;
    Ok(Json(form))
}

/// DELETE /admin/settings/addon-services/:service_id
pub async fn delete_addon_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.settings.delete_addon_service(&service_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
