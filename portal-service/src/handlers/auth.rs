//! Registration, verification, session, and profile endpoints.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use time::Duration;

use crate::dtos::auth::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
    RegisterResponse, ResendCodeRequest, UpdateProfileRequest, VerifyEmailRequest,
};
use crate::middleware::{AuthUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::models::SanitizedUser;
use crate::services::TokenResponse;
use crate::utils::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let response = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<Json<SanitizedUser>, AppError> {
    let user = state.auth.verify_email(req).await?;
    Ok(Json(user))
}

/// POST /auth/resend-code
pub async fn resend_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResendCodeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.auth.resend_code(&req.email).await?;
    Ok(Json(json!({ "message": "Verification code sent" })))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, tokens) = state.auth.login(req).await?;
    let jar = set_token_cookies(jar, &state, &tokens);
    Ok((jar, Json(AuthResponse { user, tokens })))
}

/// POST /auth/refresh
///
/// The refresh token comes from the http-only cookie; a body token is a
/// fallback for non-browser clients.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|Json(req)| req.refresh_token))
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing refresh token")))?;

    let (user, tokens) = state.auth.refresh(&token).await?;
    let jar = set_token_cookies(jar, &state, &tokens);
    Ok((jar, Json(AuthResponse { user, tokens })))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    if let Some(cookie) = jar.get(REFRESH_TOKEN_COOKIE) {
        state.auth.logout(cookie.value()).await?;
    }
    let jar = clear_token_cookies(jar);
    Ok((jar, Json(json!({ "message": "Logged out" }))))
}

/// GET /users/me
pub async fn me(AuthUser(user): AuthUser) -> Json<SanitizedUser> {
    Json(user.sanitized())
}

/// PATCH /users/me
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<SanitizedUser>, AppError> {
    let updated = state.auth.update_profile(user.id, req).await?;
    Ok(Json(updated))
}

/// POST /users/me/password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.auth.change_password(user.id, req).await?;
    Ok(Json(json!({ "message": "Password changed" })))
}

fn set_token_cookies(jar: CookieJar, state: &AppState, tokens: &TokenResponse) -> CookieJar {
    let access = build_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token.clone(),
        Duration::seconds(state.jwt.access_token_expiry_seconds()),
    );
    let refresh = build_cookie(
        REFRESH_TOKEN_COOKIE,
        tokens.refresh_token.clone(),
        Duration::days(state.jwt.refresh_token_expiry_days()),
    );
    jar.add(access).add(refresh)
}

fn clear_token_cookies(jar: CookieJar) -> CookieJar {
    jar.add(build_cookie(ACCESS_TOKEN_COOKIE, String::new(), Duration::ZERO))
        .add(build_cookie(REFRESH_TOKEN_COOKIE, String::new(), Duration::ZERO))
}

fn build_cookie(name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(max_age)
        .build()
}
