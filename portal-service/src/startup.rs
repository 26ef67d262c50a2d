//! Application startup and lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use tokio::net::TcpListener;

use portal_core::error::AppError;
use portal_core::middleware::rate_limit::create_ip_rate_limiter;

use crate::config::PortalConfig;
use crate::services::{
    AdminService, ApplicationService, AuthService, EmailProvider, GatewayService, JwtService,
    PortalDb, SettingsService, SmtpEmailService, StorageService, TransactionService,
};
use crate::{build_router, AppState};

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connect to MongoDB and S3, wire up services, and bind the listener
    /// (port 0 binds a random port, used by tests).
    pub async fn build(config: PortalConfig) -> Result<Self, AppError> {
        let mut client_options = ClientOptions::parse(config.mongodb.uri.expose_secret())
            .await
            .map_err(|e| {
                tracing::error!("Failed to parse MongoDB connection string: {}", e);
                AppError::DatabaseError(e.into())
            })?;
        client_options.app_name = Some(config.service_name.clone());

        let client = Client::with_options(client_options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::DatabaseError(e.into())
        })?;
        let db = PortalDb::new(client.database(&config.mongodb.database));

        db.init_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            AppError::DatabaseError(e)
        })?;

        let aws_config = aws_config::load_from_env().await;
        let s3 = S3Client::new(&aws_config);

        let jwt = JwtService::new(&config.jwt);
        let settings = SettingsService::new(db.clone());

        // Email branding uses the configured city name; a restart picks up
        // changes, which is fine for branding.
        let city_name = settings
            .get_or_create()
            .await
            .map(|s| s.city.name)
            .unwrap_or_else(|_| "City Government".to_string());
        let email: Arc<dyn EmailProvider> =
            Arc::new(SmtpEmailService::new(&config.smtp, city_name)?);
        let gateway = GatewayService::new(config.gateway.webhook_secret.clone());
        let auth = AuthService::new(db.clone(), jwt.clone(), email.clone());
        let admin = AdminService::new(db.clone());
        let applications = ApplicationService::new(db.clone(), settings.clone(), email.clone());
        let transactions = TransactionService::new(
            db.clone(),
            settings.clone(),
            gateway,
            email.clone(),
        );
        let storage = StorageService::new(s3, config.storage.bucket.clone(), db.clone());

        let state = AppState {
            login_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            register_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.register_attempts,
                config.rate_limit.register_window_seconds,
            ),
            config: Arc::new(config),
            db,
            jwt,
            auth,
            admin,
            settings,
            applications,
            transactions,
            storage,
        };

        let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid bind address: {}", e)))?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Portal service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}
