pub mod application;
pub mod settings;
pub mod token;
pub mod transaction;
pub mod user;

pub use application::{Application, ApplicationStatus};
pub use settings::{
    CustomServiceConfig, FeeItem, FormConfig, FormField, FormStep, Settings, BUILT_IN_SERVICES,
};
pub use token::{RefreshSession, VerificationCode};
pub use transaction::{
    BreakdownItem, ProviderMetadata, ServiceSnapshot, Transaction, TransactionStatus,
};
pub use user::{Role, SanitizedUser, User};
