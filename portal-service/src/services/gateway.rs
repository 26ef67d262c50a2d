//! Payment gateway webhook verification.
//!
//! The gateway's state machine is external; the portal only authenticates its
//! callbacks and maps event statuses onto transaction statuses.

use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

use crate::dtos::transactions::WebhookEvent;
use crate::models::TransactionStatus;

#[derive(Clone)]
pub struct GatewayService {
    webhook_secret: Secret<String>,
}

impl GatewayService {
    pub fn new(webhook_secret: Secret<String>) -> Self {
        Self { webhook_secret }
    }

    /// Verify a webhook signature.
    ///
    /// The signature is `hex(HMAC-SHA256(request_body, webhook_secret))`.
    pub fn verify_webhook_signature(&self, body: &str, signature: &str) -> Result<bool> {
        let expected = self.compute_signature(body, self.webhook_secret.expose_secret())?;
        let is_valid = expected == signature;

        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }

    pub fn parse_webhook_event(&self, body: &str) -> Result<WebhookEvent> {
        let event: WebhookEvent = serde_json::from_str(body)?;
        Ok(event)
    }

    /// Map a gateway event status onto the transaction lifecycle.
    pub fn map_event_status(&self, status: &str) -> Result<TransactionStatus> {
        status
            .parse::<TransactionStatus>()
            .map_err(|e| anyhow!("Unsupported gateway status: {}", e))
    }

    fn compute_signature(&self, payload: &str, secret: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| anyhow!("Invalid key length"))?;
        mac.update(payload.as_bytes());
        let result = mac.finalize();
        Ok(hex::encode(result.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> GatewayService {
        GatewayService::new(Secret::new("webhook_secret".to_string()))
    }

    #[test]
    fn test_signature_round_trip() {
        let service = test_service();
        let body = r#"{"reference":"LGU-ABC123","status":"paid","provider":"gateway"}"#;

        let signature = service
            .compute_signature(body, "webhook_secret")
            .unwrap();
        assert!(service.verify_webhook_signature(body, &signature).unwrap());
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let service = test_service();
        let signature = service
            .compute_signature(r#"{"reference":"LGU-ABC123"}"#, "webhook_secret")
            .unwrap();
        assert!(!service
            .verify_webhook_signature(r#"{"reference":"LGU-XYZ999"}"#, &signature)
            .unwrap());
    }

    #[test]
    fn test_event_parsing() {
        let service = test_service();
        let event = service
            .parse_webhook_event(
                r#"{"reference":"LGU-ABC123","status":"paid","provider":"gateway","provider_ref":"pay_9"}"#,
            )
            .unwrap();
        assert_eq!(event.reference, "LGU-ABC123");
        assert_eq!(event.provider_ref.as_deref(), Some("pay_9"));
        assert_eq!(
            service.map_event_status(&event.status).unwrap(),
            TransactionStatus::Paid
        );
        assert!(service.map_event_status("charge.captured").is_err());
    }
}
