//! Presigned S3 upload and download URLs for application attachments.

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use bson::{doc, Bson};
use futures::TryStreamExt;
use std::time::Duration;
use uuid::Uuid;

use crate::dtos::uploads::{PresignResponse, PresignUploadRequest};
use crate::models::User;
use crate::services::{PortalDb, ServiceError};

const PRESIGN_TTL_SECS: u64 = 900;

#[derive(Clone)]
pub struct StorageService {
    client: S3Client,
    bucket: String,
    db: PortalDb,
}

impl StorageService {
    pub fn new(client: S3Client, bucket: String, db: PortalDb) -> Self {
        Self { client, bucket, db }
    }

    /// Presign a PUT for a fresh key under the caller's own prefix. The client
    /// uploads directly to the bucket; the server never proxies file bytes.
    pub async fn presign_upload(
        &self,
        user: &User,
        req: &PresignUploadRequest,
    ) -> Result<PresignResponse, ServiceError> {
        let key = object_key(user.id, &req.file_name);

        let config = PresigningConfig::expires_in(Duration::from_secs(PRESIGN_TTL_SECS))
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("presign config: {}", e)))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&req.content_type)
            .presigned(config)
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("S3 presign failed: {}", e)))?;

        Ok(PresignResponse {
            url: presigned.uri().to_string(),
            key,
            expires_in_secs: PRESIGN_TTL_SECS,
        })
    }

    /// Presign a GET. Citizens may only read keys under their own prefix or
    /// keys referenced by one of their applications; admins may read any key.
    pub async fn presign_download(
        &self,
        user: &User,
        key: &str,
    ) -> Result<PresignResponse, ServiceError> {
        if !self.may_read(user, key).await? {
            return Err(ServiceError::Forbidden(
                "no access to this object".to_string(),
            ));
        }

        let config = PresigningConfig::expires_in(Duration::from_secs(PRESIGN_TTL_SECS))
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("presign config: {}", e)))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("S3 presign failed: {}", e)))?;

        Ok(PresignResponse {
            url: presigned.uri().to_string(),
            key: key.to_string(),
            expires_in_secs: PRESIGN_TTL_SECS,
        })
    }

    async fn may_read(&self, user: &User, key: &str) -> Result<bool, ServiceError> {
        if user.role.is_admin() {
            return Ok(true);
        }
        if key.starts_with(&format!("uploads/{}/", user.id)) {
            return Ok(true);
        }

        // A reviewer may have attached a key to the citizen's application; any
        // key referenced in their own application or transaction data is theirs
        // to read.
        let apps: Vec<crate::models::Application> = self
            .db
            .applications()
            .find(doc! { "user_id": user.id.to_string() }, None)
            .await?
            .try_collect()
            .await?;
        if apps.iter().any(|app| document_references_key(&app.data, key)) {
            return Ok(true);
        }

        let txs: Vec<crate::models::Transaction> = self
            .db
            .transactions()
            .find(doc! { "user_id": user.id.to_string() }, None)
            .await?
            .try_collect()
            .await?;
        Ok(txs.iter().any(|tx| document_references_key(&tx.data, key)))
    }
}

fn object_key(user_id: Uuid, file_name: &str) -> String {
    format!("uploads/{}/{}_{}", user_id, Uuid::new_v4(), sanitize_file_name(file_name))
}

/// Reduce a client file name to its final path component, with control
/// characters stripped.
fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether any string value in the document (recursively) equals the key.
fn document_references_key(doc: &bson::Document, key: &str) -> bool {
    doc.iter().any(|(_, value)| bson_references_key(value, key))
}

fn bson_references_key(value: &Bson, key: &str) -> bool {
    match value {
        Bson::String(s) => s == key,
        Bson::Document(d) => document_references_key(d, key),
        Bson::Array(items) => items.iter().any(|v| bson_references_key(v, key)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_scoped_to_the_owner() {
        let user_id = Uuid::new_v4();
        let key = object_key(user_id, "permit.pdf");
        assert!(key.starts_with(&format!("uploads/{}/", user_id)));
        assert!(key.ends_with("_permit.pdf"));
    }

    #[test]
    fn file_names_reduce_to_their_base_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("a\\b.txt"), "b.txt");
        assert_eq!(sanitize_file_name("..."), "file");
        assert_eq!(sanitize_file_name("receipt.png"), "receipt.png");
    }

    #[test]
    fn nested_document_key_references_are_found() {
        let data = doc! {
            "attachments": [
                { "proof": "uploads/abc/1_receipt.png" },
            ],
            "name": "Juan",
        };
        assert!(document_references_key(&data, "uploads/abc/1_receipt.png"));
        assert!(!document_references_key(&data, "uploads/abc/other.png"));
    }

    #[test]
    fn transaction_form_data_grants_key_access() {
        use crate::models::{ServiceSnapshot, Transaction, TransactionStatus};

        let now = bson::DateTime::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            reference: "LGU-TEST0001".to_string(),
            user_id: Uuid::new_v4(),
            service: ServiceSnapshot {
                service_id: "business_permit".to_string(),
                name: "Business Permit".to_string(),
            },
            channel: None,
            status: TransactionStatus::Pending,
            breakdown: Vec::new(),
            total_amount_minor: 0,
            currency: "PHP".to_string(),
            data: doc! { "proof_of_payment": "uploads/abc/2_deposit_slip.jpg" },
            provider: None,
            transaction_date: None,
            created_at: now,
            updated_at: now,
        };
        assert!(document_references_key(
            &tx.data,
            "uploads/abc/2_deposit_slip.jpg"
        ));
        assert!(!document_references_key(&tx.data, "uploads/abc/other.jpg"));
    }
}
