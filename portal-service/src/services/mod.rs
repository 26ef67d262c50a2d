//! Business logic services for the portal.

pub mod admin;
pub mod applications;
pub mod auth;
pub mod database;
pub mod email;
pub mod error;
pub mod export;
pub mod gateway;
pub mod jwt;
pub mod reports;
pub mod settings;
pub mod storage;
pub mod transactions;

pub use admin::AdminService;
pub use applications::ApplicationService;
pub use auth::AuthService;
pub use database::PortalDb;
pub use email::{EmailProvider, MockEmailService, SmtpEmailService};
pub use error::ServiceError;
pub use gateway::GatewayService;
pub use jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims, TokenResponse};
pub use settings::SettingsService;
pub use storage::StorageService;
pub use transactions::TransactionService;
