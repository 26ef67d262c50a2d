use serde::Deserialize;
use validator::Validate;

use crate::models::BreakdownItem;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    #[validate(length(min = 1))]
    pub service_id: String,
    pub channel: Option<String>,
    #[validate(length(min = 1, message = "breakdown must not be empty"))]
    pub breakdown: Vec<BreakdownItem>,
    /// Client-computed total; the server verifies it against the breakdown sum
    /// and rejects mismatches.
    pub total_amount_minor: i64,
    /// Business date (RFC 3339 or YYYY-MM-DD); defaults to now.
    pub transaction_date: Option<String>,
    /// Form data captured with the payment (attachment keys included).
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1))]
    pub status: String,
    pub provider: Option<String>,
    pub provider_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub status: Option<String>,
    pub service_id: Option<String>,
    pub channel: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(flatten)]
    pub pagination: super::Pagination,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub period: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub service_id: Option<String>,
    pub channel: Option<String>,
    pub status: Option<String>,
    pub series_by: Option<String>,
}

/// Payment gateway webhook payload. The gateway's own state machine is external;
/// the portal only maps its terminal notifications onto transaction statuses.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub reference: String,
    pub status: String,
    pub provider: String,
    pub provider_ref: Option<String>,
}
