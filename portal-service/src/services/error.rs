use portal_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Verification code expired")]
    CodeExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("User not found")]
    UserNotFound,

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Application not found")]
    ApplicationNotFound,

    #[error("Unknown service: {0}")]
    ServiceNotFound(String),

    #[error("Service is disabled: {0}")]
    ServiceDisabled(String),

    #[error("Service id already exists: {0}")]
    DuplicateService(String),

    #[error("Duplicate transaction reference")]
    DuplicateReference,

    #[error("Breakdown total {breakdown} does not match declared total {declared}")]
    BreakdownMismatch { breakdown: i64, declared: i64 },

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid report period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Email error: {0}")]
    EmailError(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::EmailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::InvalidCode => {
                AppError::BadRequest(anyhow::anyhow!("Invalid verification code"))
            }
            ServiceError::CodeExpired => {
                AppError::BadRequest(anyhow::anyhow!("Verification code expired"))
            }
            ServiceError::InvalidToken => AppError::Unauthorized(anyhow::anyhow!("Invalid token")),
            ServiceError::InvalidSignature => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid webhook signature"))
            }
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::TransactionNotFound => {
                AppError::NotFound(anyhow::anyhow!("Transaction not found"))
            }
            ServiceError::ApplicationNotFound => {
                AppError::NotFound(anyhow::anyhow!("Application not found"))
            }
            ServiceError::ServiceNotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Unknown service: {}", id))
            }
            ServiceError::ServiceDisabled(id) => {
                AppError::BadRequest(anyhow::anyhow!("Service is disabled: {}", id))
            }
            ServiceError::DuplicateService(id) => {
                AppError::Conflict(anyhow::anyhow!("Service id already exists: {}", id))
            }
            ServiceError::DuplicateReference => {
                AppError::Conflict(anyhow::anyhow!("Duplicate transaction reference"))
            }
            ServiceError::BreakdownMismatch { breakdown, declared } => AppError::BadRequest(
                anyhow::anyhow!(
                    "Breakdown total {} does not match declared total {}",
                    breakdown,
                    declared
                ),
            ),
            ServiceError::InvalidTransition(msg) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid status transition: {}", msg))
            }
            ServiceError::InvalidPeriod(p) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid report period: {}", p))
            }
            ServiceError::InvalidParameter(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::EmailError(e) => AppError::EmailError(e),
        }
    }
}
