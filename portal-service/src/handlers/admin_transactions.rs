//! Admin transaction endpoints: listing, status updates, reports, CSV export.

use axum::{
    extract::{Json, Path, Query, State},
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::dtos::transactions::{ListTransactionsQuery, ReportQuery, UpdateStatusRequest};
use crate::dtos::Paginated;
use crate::middleware::AuthUser;
use crate::models::Transaction;
use crate::services::export::transactions_to_csv;
use crate::services::reports::AggregateReport;
use crate::utils::ValidatedJson;
use crate::AppState;
use portal_core::error::AppError;

/// GET /admin/transactions
pub async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Paginated<Transaction>>, AppError> {
    let page = state.transactions.admin_list(&actor, &query).await?;
    Ok(Json(page))
}

/// PATCH /admin/transactions/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(tx_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateStatusRequest>,
) -> Result<Json<Transaction>, AppError> {
    let tx = state.transactions.update_status(tx_id, req).await?;
    Ok(Json(tx))
}

/// GET /admin/transactions/report
pub async fn report(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ReportQuery>,
) -> Result<Json<AggregateReport>, AppError> {
    let report = state.transactions.report(&actor, &query).await?;
    Ok(Json(report))
}

/// GET /admin/transactions/export
///
/// CSV download of everything the list endpoint would return, unpaginated.
pub async fn export(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let transactions = state
        .transactions
        .export_list(&actor, &query)
        .await?;
    let csv = transactions_to_csv(&transactions);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"transactions.csv\"",
            ),
        ],
        csv,
    ))
}
