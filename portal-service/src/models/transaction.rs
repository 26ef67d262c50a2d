//! Payment transaction records.
//!
//! A transaction is a near-immutable record of one payment attempt. The service
//! identity is snapshotted at creation time so later catalog edits never rewrite
//! history, and all monetary amounts are integers in minor currency units
//! (centavos) to keep floating point out of currency math.

use bson::{DateTime, Document};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    AwaitingPayment,
    Paid,
    Refunded,
    Failed,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::AwaitingPayment => "awaiting_payment",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Completed => "completed",
        }
    }

    /// A transaction counts as successful iff it reached paid or completed.
    pub fn is_successful(&self) -> bool {
        matches!(self, TransactionStatus::Paid | TransactionStatus::Completed)
    }

    /// Legal status transitions:
    /// pending -> awaiting_payment | failed
    /// awaiting_payment -> paid | failed
    /// failed -> awaiting_payment (retry)
    /// paid -> completed | refunded
    /// completed -> refunded
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, AwaitingPayment)
                | (Pending, Failed)
                | (AwaitingPayment, Paid)
                | (AwaitingPayment, Failed)
                | (Failed, AwaitingPayment)
                | (Paid, Completed)
                | (Paid, Refunded)
                | (Completed, Refunded)
        )
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "awaiting_payment" => Ok(TransactionStatus::AwaitingPayment),
            "paid" => Ok(TransactionStatus::Paid),
            "refunded" => Ok(TransactionStatus::Refunded),
            "failed" => Ok(TransactionStatus::Failed),
            "completed" => Ok(TransactionStatus::Completed),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// Denormalized copy of a service's identity captured at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub service_id: String,
    pub name: String,
}

/// One line of the itemized amount breakdown. Discounts carry negative amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownItem {
    pub label: String,
    pub amount_minor: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub provider: String,
    pub provider_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Unique human-facing reference, e.g. "LGU-8F3K2Q1D". A unique index on this
    /// field surfaces concurrent double-creation as a conflict.
    pub reference: String,
    pub user_id: Uuid,
    pub service: ServiceSnapshot,
    pub channel: Option<String>,
    pub status: TransactionStatus,
    pub breakdown: Vec<BreakdownItem>,
    pub total_amount_minor: i64,
    pub currency: String,
    /// Payer-supplied form data captured with the payment, e.g. attachment keys
    /// for services that require supporting documents.
    #[serde(default)]
    pub data: Document,
    pub provider: Option<ProviderMetadata>,
    /// Business date of the payment, when it differs from the record's creation
    /// timestamp (e.g. over-the-counter payments encoded later).
    pub transaction_date: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Transaction {
    pub fn breakdown_total(&self) -> i64 {
        self.breakdown.iter().map(|item| item.amount_minor).sum()
    }

    /// Invariant enforced on the creation path: the stored total must equal the
    /// sum of the breakdown lines.
    pub fn breakdown_is_consistent(&self) -> bool {
        self.total_amount_minor == self.breakdown_total()
    }

    /// The date used for report bucketing: the business date, falling back to the
    /// creation timestamp when no business date was recorded.
    pub fn effective_date(&self) -> chrono::DateTime<Utc> {
        self.transaction_date
            .unwrap_or(self.created_at)
            .to_chrono()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_transaction() -> Transaction {
        let now = DateTime::now();
        Transaction {
            id: Uuid::new_v4(),
            reference: "LGU-TEST0001".to_string(),
            user_id: Uuid::new_v4(),
            service: ServiceSnapshot {
                service_id: "business_permit".to_string(),
                name: "Business Permit".to_string(),
            },
            channel: Some("online".to_string()),
            status: TransactionStatus::Pending,
            breakdown: vec![
                BreakdownItem {
                    label: "Base fee".to_string(),
                    amount_minor: 50_000,
                },
                BreakdownItem {
                    label: "Senior citizen discount".to_string(),
                    amount_minor: -5_000,
                },
            ],
            total_amount_minor: 45_000,
            currency: "PHP".to_string(),
            data: Document::new(),
            provider: None,
            transaction_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn breakdown_sum_is_sign_sensitive() {
        let tx = base_transaction();
        assert_eq!(tx.breakdown_total(), 45_000);
        assert!(tx.breakdown_is_consistent());
    }

    #[test]
    fn inconsistent_breakdown_is_detected() {
        let mut tx = base_transaction();
        tx.total_amount_minor = 50_000;
        assert!(!tx.breakdown_is_consistent());
    }

    #[test]
    fn effective_date_prefers_business_date() {
        let mut tx = base_transaction();
        assert_eq!(tx.effective_date(), tx.created_at.to_chrono());

        let business = DateTime::parse_rfc3339_str("2024-02-10T08:00:00Z").unwrap();
        tx.transaction_date = Some(business);
        assert_eq!(tx.effective_date(), business.to_chrono());
    }

    #[test]
    fn status_lifecycle_follows_the_payment_flow() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(AwaitingPayment));
        assert!(AwaitingPayment.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Completed));
        assert!(Paid.can_transition_to(Refunded));
        assert!(Failed.can_transition_to(AwaitingPayment));

        assert!(!Pending.can_transition_to(Paid));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(!Completed.can_transition_to(Pending));
    }

    #[test]
    fn only_paid_and_completed_are_successful() {
        use TransactionStatus::*;
        assert!(Paid.is_successful());
        assert!(Completed.is_successful());
        for status in [Pending, AwaitingPayment, Refunded, Failed] {
            assert!(!status.is_successful());
        }
    }

    #[test]
    fn ids_are_stored_and_queried_as_strings() {
        // Lookups filter on `_id`/`user_id` with `Uuid::to_string()`; the stored
        // representation must agree or every id-keyed query silently misses.
        let tx = base_transaction();
        let stored = bson::to_document(&tx).unwrap();
        assert_eq!(stored.get_str("_id").unwrap(), tx.id.to_string());
        assert_eq!(stored.get_str("user_id").unwrap(), tx.user_id.to_string());

        let filter = bson::doc! { "_id": tx.id.to_string() };
        assert_eq!(filter.get("_id"), stored.get("_id"));
    }

    #[test]
    fn status_round_trips_through_strings() {
        use TransactionStatus::*;
        for status in [Pending, AwaitingPayment, Paid, Refunded, Failed, Completed] {
            assert_eq!(status.as_str().parse::<TransactionStatus>(), Ok(status));
        }
        assert!("cancelled".parse::<TransactionStatus>().is_err());
    }
}
