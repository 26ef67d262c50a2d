pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use portal_core::error::AppError;
use portal_core::middleware::rate_limit::{ip_rate_limit_middleware, IpRateLimiter};
use portal_core::middleware::security_headers::security_headers_middleware;
use portal_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};

use crate::config::PortalConfig;
use crate::services::{
    AdminService, ApplicationService, AuthService, JwtService, PortalDb, SettingsService,
    StorageService, TransactionService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub db: PortalDb,
    pub jwt: JwtService,
    pub auth: AuthService,
    pub admin: AdminService,
    pub settings: SettingsService,
    pub applications: ApplicationService,
    pub transactions: TransactionService,
    pub storage: StorageService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    // Login and register get their own IP rate limits.
    let login_limiter = state.login_rate_limiter.clone();
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    let register_limiter = state.register_rate_limiter.clone();
    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            register_limiter,
            ip_rate_limit_middleware,
        ));

    // Routes behind authentication.
    let authed_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/users/me",
            get(handlers::auth::me).patch(handlers::auth::update_profile),
        )
        .route(
            "/users/me/password",
            post(handlers::auth::change_password),
        )
        .route("/applications", post(handlers::applications::create_draft))
        .route("/applications/mine", get(handlers::applications::list_mine))
        .route(
            "/applications/:id",
            get(handlers::applications::get)
                .put(handlers::applications::update_draft)
                .delete(handlers::applications::delete_draft),
        )
        .route("/applications/:id/submit", post(handlers::applications::submit))
        .route("/transactions", post(handlers::transactions::create))
        .route("/transactions/mine", get(handlers::transactions::list_mine))
        .route("/transactions/:id", get(handlers::transactions::get))
        .route("/uploads/presign", post(handlers::uploads::presign_upload))
        .route(
            "/uploads/presign-download",
            get(handlers::uploads::presign_download),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Admin routes: authenticated, then role-checked.
    let admin_routes = Router::new()
        .route("/admin/users", get(handlers::admin_users::list_users))
        .route(
            "/admin/users/:id",
            get(handlers::admin_users::get_user)
                .patch(handlers::admin_users::update_user)
                .delete(handlers::admin_users::delete_user),
        )
        .route(
            "/admin/settings",
            get(handlers::settings::get_settings).patch(handlers::settings::update_settings),
        )
        .route(
            "/admin/settings/custom-services",
            post(handlers::settings::create_custom_service),
        )
        .route(
            "/admin/settings/custom-services/:service_id",
            axum::routing::patch(handlers::settings::update_custom_service)
                .delete(handlers::settings::delete_custom_service),
        )
        .route(
            "/admin/settings/addon-services",
            post(handlers::settings::create_addon_service),
        )
        .route(
            "/admin/settings/addon-services/:service_id",
            axum::routing::patch(handlers::settings::update_addon_service)
                .delete(handlers::settings::delete_addon_service),
        )
        .route(
            "/admin/applications",
            get(handlers::applications::admin_list),
        )
        .route(
            "/admin/applications/:id/status",
            axum::routing::patch(handlers::applications::review),
        )
        .route(
            "/admin/transactions",
            get(handlers::admin_transactions::list),
        )
        .route(
            "/admin/transactions/report",
            get(handlers::admin_transactions::report),
        )
        .route(
            "/admin/transactions/export",
            get(handlers::admin_transactions::export),
        )
        .route(
            "/admin/transactions/:id/status",
            axum::routing::patch(handlers::admin_transactions::update_status),
        )
        .layer(from_fn(middleware::admin_middleware))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/settings", get(handlers::settings::public_settings))
        .route("/auth/verify-email", post(handlers::auth::verify_email))
        .route("/auth/resend-code", post(handlers::auth::resend_code))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/transactions/webhook",
            post(handlers::transactions::payment_webhook),
        )
        .merge(login_route)
        .merge(register_route)
        .merge(authed_routes)
        .merge(admin_routes)
        .with_state(state.clone())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config))
}

fn cors_layer(config: &PortalConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(
            config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!("Invalid CORS origin '{}': {}", o, e);
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Service health check: liveness plus a database ping.
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "MongoDB health check failed");
        e
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "checks": { "mongodb": "up" }
    })))
}
