//! MongoDB wrapper: typed collections, index setup, health check.

use anyhow::Result;
use mongodb::options::IndexOptions;
use mongodb::{bson::doc, Collection, Database, IndexModel};

use crate::models::{Application, RefreshSession, Settings, Transaction, User, VerificationCode};

#[derive(Clone)]
pub struct PortalDb {
    db: Database,
}

impl PortalDb {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn transactions(&self) -> Collection<Transaction> {
        self.db.collection("transactions")
    }

    pub fn settings(&self) -> Collection<Settings> {
        self.db.collection("settings")
    }

    pub fn applications(&self) -> Collection<Application> {
        self.db.collection("applications")
    }

    pub fn verification_codes(&self) -> Collection<VerificationCode> {
        self.db.collection("verification_codes")
    }

    pub fn refresh_sessions(&self) -> Collection<RefreshSession> {
        self.db.collection("refresh_sessions")
    }

    /// Initialize collection indexes.
    ///
    /// The unique indexes are load-bearing: concurrent double-creation of a user
    /// or a transaction reference must surface as a write conflict rather than a
    /// silent duplicate.
    pub async fn init_indexes(&self) -> Result<()> {
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("unique_user_email_idx".to_string())
                    .build(),
            )
            .build();
        self.users().create_indexes([unique_email], None).await?;

        let unique_reference = IndexModel::builder()
            .keys(doc! { "reference": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("unique_transaction_reference_idx".to_string())
                    .build(),
            )
            .build();
        let user_tx = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("user_transaction_idx".to_string())
                    .build(),
            )
            .build();
        let status_tx = IndexModel::builder()
            .keys(doc! { "status": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("status_transaction_idx".to_string())
                    .build(),
            )
            .build();
        let service_tx = IndexModel::builder()
            .keys(doc! { "service.service_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("service_transaction_idx".to_string())
                    .build(),
            )
            .build();
        self.transactions()
            .create_indexes([unique_reference, user_tx, status_tx, service_tx], None)
            .await?;

        let user_app = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("user_application_idx".to_string())
                    .build(),
            )
            .build();
        let status_app = IndexModel::builder()
            .keys(doc! { "status": 1, "service_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("status_application_idx".to_string())
                    .build(),
            )
            .build();
        self.applications()
            .create_indexes([user_app, status_app], None)
            .await?;

        let code_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("verification_code_email_idx".to_string())
                    .build(),
            )
            .build();
        self.verification_codes()
            .create_indexes([code_email], None)
            .await?;

        // TTL cleanup for refresh sessions past their expiry.
        let session_expiry = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(std::time::Duration::from_secs(0))
                    .name("refresh_session_ttl_idx".to_string())
                    .build(),
            )
            .build();
        self.refresh_sessions()
            .create_indexes([session_expiry], None)
            .await?;

        tracing::info!("Portal indexes initialized");
        Ok(())
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

/// True when a Mongo write failed on a unique index (E11000 duplicate key).
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::BulkWrite(bulk) => bulk
            .write_errors
            .as_ref()
            .map(|errors| errors.iter().any(|e| e.code == 11000))
            .unwrap_or(false),
        _ => false,
    }
}
