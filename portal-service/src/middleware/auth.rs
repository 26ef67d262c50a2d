use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::dtos::ErrorResponse;
use crate::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

type AuthRejection = (StatusCode, Json<ErrorResponse>);

fn unauthorized(message: &str) -> AuthRejection {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Require a valid access token, from the Authorization header or the access
/// cookie, and load the authenticated user into request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthRejection> {
    let header_token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    let token = header_token
        .or_else(|| jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| unauthorized("Missing access token"))?;

    let claims = state
        .jwt
        .validate_access_token(&token)
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| unauthorized("Invalid or expired token"))?;
    let user = state
        .auth
        .get_user(user_id)
        .await
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Require an admin or super admin role. Must run after `auth_middleware`.
pub async fn admin_middleware(req: Request, next: Next) -> Result<impl IntoResponse, AuthRejection> {
    let is_admin = req
        .extensions()
        .get::<crate::models::User>()
        .map(|user| user.role.is_admin())
        .unwrap_or(false);

    if !is_admin {
        tracing::warn!("Rejected non-admin request to an admin route");
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Admin access required".to_string(),
            }),
        ));
    }
    Ok(next.run(req).await)
}

/// Extractor for the authenticated user placed in extensions by
/// `auth_middleware`.
pub struct AuthUser(pub crate::models::User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<crate::models::User>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Authenticated user missing from request extensions".to_string(),
            }),
        ))?;
        Ok(AuthUser(user.clone()))
    }
}
