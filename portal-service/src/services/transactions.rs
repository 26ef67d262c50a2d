//! Payment transaction recording, status flow, webhook intake, and reporting.

use bson::doc;
use futures::TryStreamExt;
use rand::Rng;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::transactions::{
    CreateTransactionRequest, ListTransactionsQuery, ReportQuery, UpdateStatusRequest,
};
use crate::dtos::Paginated;
use crate::models::{
    BreakdownItem, ProviderMetadata, Role, ServiceSnapshot, Transaction, TransactionStatus, User,
};
use crate::services::applications::json_map_to_document;
use crate::services::database::is_duplicate_key_error;
use crate::services::reports::{
    aggregate, build_filter, parse_date_bound, AggregateReport, Period, ReportParams,
    SeriesDimension, ServiceScope,
};
use crate::services::settings::SettingsService;
use crate::services::{EmailProvider, GatewayService, PortalDb, ServiceError};

const CURRENCY: &str = "PHP";
const REFERENCE_PREFIX: &str = "LGU";
/// Uppercase alphanumerics with the ambiguous 0/O/1/I/L dropped.
const REFERENCE_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const REFERENCE_LEN: usize = 8;
const REFERENCE_RETRIES: usize = 3;

#[derive(Clone)]
pub struct TransactionService {
    db: PortalDb,
    settings: SettingsService,
    gateway: GatewayService,
    email: Arc<dyn EmailProvider>,
}

impl TransactionService {
    pub fn new(
        db: PortalDb,
        settings: SettingsService,
        gateway: GatewayService,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            db,
            settings,
            gateway,
            email,
        }
    }

    pub async fn create(
        &self,
        user: &User,
        req: CreateTransactionRequest,
    ) -> Result<Transaction, ServiceError> {
        let settings = self.settings.get_or_create().await?;
        let service_name = settings
            .service_display_name(&req.service_id)
            .ok_or_else(|| ServiceError::ServiceNotFound(req.service_id.clone()))?;
        if !settings.service_enabled(&req.service_id) {
            return Err(ServiceError::ServiceDisabled(req.service_id.clone()));
        }

        validate_breakdown(&req.breakdown, req.total_amount_minor)?;
        let data = json_map_to_document(req.data)?;

        let transaction_date = req
            .transaction_date
            .as_deref()
            .map(|v| parse_date_bound(v, false))
            .transpose()?
            .map(bson::DateTime::from_chrono);

        let now = bson::DateTime::now();
        let mut tx = Transaction {
            id: Uuid::new_v4(),
            reference: generate_reference(),
            user_id: user.id,
            service: ServiceSnapshot {
                service_id: req.service_id,
                name: service_name,
            },
            channel: req.channel,
            status: TransactionStatus::Pending,
            breakdown: req.breakdown,
            total_amount_minor: req.total_amount_minor,
            currency: CURRENCY.to_string(),
            data,
            provider: None,
            transaction_date,
            created_at: now,
            updated_at: now,
        };

        // The unique reference index arbitrates; regenerate on the rare collision.
        for attempt in 0..REFERENCE_RETRIES {
            match self.db.transactions().insert_one(&tx, None).await {
                Ok(_) => return Ok(tx),
                Err(e) if is_duplicate_key_error(&e) && attempt + 1 < REFERENCE_RETRIES => {
                    tx.reference = generate_reference();
                }
                Err(e) if is_duplicate_key_error(&e) => {
                    return Err(ServiceError::DuplicateReference)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ServiceError::DuplicateReference)
    }

    pub async fn get(&self, user: &User, tx_id: Uuid) -> Result<Transaction, ServiceError> {
        let filter = if user.role.is_admin() {
            doc! { "_id": tx_id.to_string() }
        } else {
            doc! { "_id": tx_id.to_string(), "user_id": user.id.to_string() }
        };
        self.db
            .transactions()
            .find_one(filter, None)
            .await?
            .ok_or(ServiceError::TransactionNotFound)
    }

    pub async fn list_mine(
        &self,
        user: &User,
        query: &ListTransactionsQuery,
    ) -> Result<Paginated<Transaction>, ServiceError> {
        let params = list_params(query, None)?;
        let mut filter = build_filter(&params);
        filter.insert("user_id", user.id.to_string());
        self.page(filter, query).await
    }

    /// Admin listing. Admins with a non-empty allowed-service list only see
    /// transactions inside that scope; super admins see everything.
    pub async fn admin_list(
        &self,
        actor: &User,
        query: &ListTransactionsQuery,
    ) -> Result<Paginated<Transaction>, ServiceError> {
        let scope = self.scope_for(actor).await?;
        let params = list_params(query, scope)?;
        let filter = build_filter(&params);
        self.page(filter, query).await
    }

    /// Unpaginated listing for CSV export, scoped like `admin_list`. Capped so
    /// a runaway export cannot hold the whole collection in memory.
    pub async fn export_list(
        &self,
        actor: &User,
        query: &ListTransactionsQuery,
    ) -> Result<Vec<Transaction>, ServiceError> {
        const EXPORT_CAP: i64 = 50_000;

        let scope = self.scope_for(actor).await?;
        let params = list_params(query, scope)?;
        let filter = build_filter(&params);

        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(EXPORT_CAP)
            .build();
        let items: Vec<Transaction> = self
            .db
            .transactions()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(items)
    }

    pub async fn update_status(
        &self,
        tx_id: Uuid,
        req: UpdateStatusRequest,
    ) -> Result<Transaction, ServiceError> {
        let next = TransactionStatus::from_str(&req.status)
            .map_err(ServiceError::InvalidParameter)?;

        let mut tx = self
            .db
            .transactions()
            .find_one(doc! { "_id": tx_id.to_string() }, None)
            .await?
            .ok_or(ServiceError::TransactionNotFound)?;

        let provider = req.provider.map(|provider| ProviderMetadata {
            provider,
            provider_ref: req.provider_ref,
        });
        self.transition(&mut tx, next, provider).await?;
        Ok(tx)
    }

    /// Verify and apply a payment gateway notification. The transaction is
    /// looked up by its reference, the only identifier a gateway holds.
    pub async fn apply_webhook(
        &self,
        body: &str,
        signature: &str,
    ) -> Result<Transaction, ServiceError> {
        let valid = self
            .gateway
            .verify_webhook_signature(body, signature)
            .map_err(ServiceError::Internal)?;
        if !valid {
            return Err(ServiceError::InvalidSignature);
        }

        let event = self
            .gateway
            .parse_webhook_event(body)
            .map_err(|e| ServiceError::InvalidParameter(e.to_string()))?;
        let next = self
            .gateway
            .map_event_status(&event.status)
            .map_err(|e| ServiceError::InvalidParameter(e.to_string()))?;

        let mut tx = self
            .db
            .transactions()
            .find_one(doc! { "reference": &event.reference }, None)
            .await?
            .ok_or(ServiceError::TransactionNotFound)?;

        // Gateways retry deliveries; an already-applied status is not an error.
        if tx.status == next {
            return Ok(tx);
        }

        let provider = Some(ProviderMetadata {
            provider: event.provider,
            provider_ref: event.provider_ref,
        });
        self.transition(&mut tx, next, provider).await?;
        Ok(tx)
    }

    async fn transition(
        &self,
        tx: &mut Transaction,
        next: TransactionStatus,
        provider: Option<ProviderMetadata>,
    ) -> Result<(), ServiceError> {
        if !tx.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition(format!(
                "{} -> {}",
                tx.status.as_str(),
                next.as_str()
            )));
        }

        tx.status = next;
        if provider.is_some() {
            tx.provider = provider;
        }
        tx.updated_at = bson::DateTime::now();
        self.db
            .transactions()
            .replace_one(doc! { "_id": tx.id.to_string() }, &*tx, None)
            .await?;

        self.notify_payer(tx).await;
        Ok(())
    }

    /// Best-effort email to the payer on status changes.
    async fn notify_payer(&self, tx: &Transaction) {
        let user = match self
            .db
            .users()
            .find_one(doc! { "_id": tx.user_id.to_string() }, None)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, reference = %tx.reference, "Payer lookup failed");
                return;
            }
        };

        let email = self.email.clone();
        let reference = tx.reference.clone();
        let service_name = tx.service.name.clone();
        let status = tx.status.as_str().to_string();
        tokio::spawn(async move {
            if let Err(e) = email
                .send_transaction_status(&user.email, &reference, &service_name, &status)
                .await
            {
                tracing::warn!(error = %e, "Transaction status email failed");
            }
        });
    }

    /// Aggregate report over transactions matching the query, scoped to the
    /// caller's allowed services.
    pub async fn report(
        &self,
        actor: &User,
        query: &ReportQuery,
    ) -> Result<AggregateReport, ServiceError> {
        let params = self.report_params(actor, query).await?;
        let filter = build_filter(&params);

        let transactions: Vec<Transaction> = self
            .db
            .transactions()
            .find(filter, None)
            .await?
            .try_collect()
            .await?;

        Ok(aggregate(&transactions, &params))
    }

    async fn report_params(
        &self,
        actor: &User,
        query: &ReportQuery,
    ) -> Result<ReportParams, ServiceError> {
        let period = Period::parse(&query.period)?;
        let series_by = query
            .series_by
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(SeriesDimension::parse)
            .transpose()?;
        let from = query
            .from
            .as_deref()
            .map(|v| parse_date_bound(v, false))
            .transpose()?;
        let to = query
            .to
            .as_deref()
            .map(|v| parse_date_bound(v, true))
            .transpose()?;
        let status = query
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(TransactionStatus::from_str)
            .transpose()
            .map_err(ServiceError::InvalidParameter)?;

        Ok(ReportParams {
            period,
            from,
            to,
            service_id: query.service_id.clone().filter(|s| !s.is_empty()),
            channel: query.channel.clone().filter(|s| !s.is_empty()),
            status,
            series_by,
            scope: self.scope_for(actor).await?,
        })
    }

    /// Service scope for a non-super admin with a non-empty allowed-service
    /// list; `None` means unrestricted.
    async fn scope_for(&self, actor: &User) -> Result<Option<ServiceScope>, ServiceError> {
        if actor.role == Role::SuperAdmin || actor.allowed_services.is_empty() {
            return Ok(None);
        }
        let settings = self.settings.get_or_create().await?;
        Ok(Some(ServiceScope::normalize(
            &actor.allowed_services,
            &settings.service_catalog(),
        )))
    }

    async fn page(
        &self,
        filter: bson::Document,
        query: &ListTransactionsQuery,
    ) -> Result<Paginated<Transaction>, ServiceError> {
        let total = self
            .db
            .transactions()
            .count_documents(filter.clone(), None)
            .await?;
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(query.pagination.skip())
            .limit(query.pagination.limit())
            .build();
        let items: Vec<Transaction> = self
            .db
            .transactions()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;

        Ok(Paginated {
            items,
            total,
            page: query.pagination.page,
            per_page: query.pagination.limit(),
        })
    }
}

/// Translate list-endpoint query parameters into the shared filter shape used
/// by reports, so date semantics stay identical across both.
fn list_params(
    query: &ListTransactionsQuery,
    scope: Option<ServiceScope>,
) -> Result<ReportParams, ServiceError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(TransactionStatus::from_str)
        .transpose()
        .map_err(ServiceError::InvalidParameter)?;
    let from = query
        .from
        .as_deref()
        .map(|v| parse_date_bound(v, false))
        .transpose()?;
    let to = query
        .to
        .as_deref()
        .map(|v| parse_date_bound(v, true))
        .transpose()?;

    Ok(ReportParams {
        period: Period::Day,
        from,
        to,
        service_id: query.service_id.clone().filter(|s| !s.is_empty()),
        channel: query.channel.clone().filter(|s| !s.is_empty()),
        status,
        series_by: None,
        scope,
    })
}

/// The declared total must equal the sum of the breakdown lines. Runs before
/// any database access on the creation path.
fn validate_breakdown(breakdown: &[BreakdownItem], declared: i64) -> Result<(), ServiceError> {
    let breakdown_total: i64 = breakdown.iter().map(|i| i.amount_minor).sum();
    if breakdown_total != declared {
        return Err(ServiceError::BreakdownMismatch {
            breakdown: breakdown_total,
            declared,
        });
    }
    Ok(())
}

fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..REFERENCE_LEN)
        .map(|_| REFERENCE_CHARSET[rng.gen_range(0..REFERENCE_CHARSET.len())] as char)
        .collect();
    format!("{}-{}", REFERENCE_PREFIX, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_breakdown_is_rejected() {
        let breakdown = vec![
            BreakdownItem {
                label: "Base fee".to_string(),
                amount_minor: 50_000,
            },
            BreakdownItem {
                label: "Senior citizen discount".to_string(),
                amount_minor: -5_000,
            },
        ];
        assert!(validate_breakdown(&breakdown, 45_000).is_ok());

        match validate_breakdown(&breakdown, 50_000) {
            Err(ServiceError::BreakdownMismatch { breakdown, declared }) => {
                assert_eq!(breakdown, 45_000);
                assert_eq!(declared, 50_000);
            }
            other => panic!("expected a breakdown mismatch, got {:?}", other),
        }
    }

    #[test]
    fn breakdown_mismatch_surfaces_as_bad_request() {
        use portal_core::error::AppError;

        let err = validate_breakdown(&[], 100).expect_err("empty breakdown cannot sum to 100");
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));
    }

    #[test]
    fn references_use_the_unambiguous_charset() {
        for _ in 0..50 {
            let r = generate_reference();
            let (prefix, suffix) = r.split_once('-').unwrap();
            assert_eq!(prefix, "LGU");
            assert_eq!(suffix.len(), REFERENCE_LEN);
            assert!(suffix
                .bytes()
                .all(|b| REFERENCE_CHARSET.contains(&b)));
        }
    }
}
