//! Citizen transaction endpoints and the payment gateway webhook.

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use uuid::Uuid;

use crate::dtos::transactions::{CreateTransactionRequest, ListTransactionsQuery};
use crate::dtos::Paginated;
use crate::middleware::AuthUser;
use crate::models::Transaction;
use crate::utils::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";

/// POST /transactions
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let tx = state.transactions.create(&user, req).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

/// GET /transactions/mine
pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Paginated<Transaction>>, AppError> {
    let page = state.transactions.list_mine(&user, &query).await?;
    Ok(Json(page))
}

/// GET /transactions/:id
pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tx_id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    let tx = state.transactions.get(&user, tx_id).await?;
    Ok(Json(tx))
}

/// POST /transactions/webhook
///
/// Unauthenticated; trust comes from the HMAC signature over the raw body.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature")))?;

    let tx = state.transactions.apply_webhook(&body, signature).await?;
    Ok(Json(serde_json::json!({
        "reference": tx.reference,
        "status": tx.status.as_str(),
    })))
}
