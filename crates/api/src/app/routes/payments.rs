//! Payments against contracts.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::{delete, get},
};
use chrono::Utc;

use caretrack_auth::permissions::{PAYMENTS_READ, PAYMENTS_WRITE};
use caretrack_contracts::{Contract, Payment, payment_totals};
use caretrack_core::{DomainError, PaymentId};
use caretrack_infra::WriteBatch;
use caretrack_people::Person;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_payments).post(record_payment))
        .route("/totals", get(totals))
        .route("/:id", delete(void_payment))
}

/// GET /payments?contract_id= - newest payment date first
pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::PaymentListQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PAYMENTS_READ)?;
    let mut payments: Vec<Payment> = services
        .records::<Payment>()
        .list_active(tenant.tenant_id())
        .await?
        .into_iter()
        .filter(|p| query.contract_id.is_none_or(|id| p.contract_id == id))
        .collect();
    payments.sort_by(|a, b| b.paid_on.cmp(&a.paid_on).then(b.created_at.cmp(&a.created_at)));
    Ok(dto::items(payments))
}

/// GET /payments/totals - per-contract count, sum and last payment date
pub async fn totals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PAYMENTS_READ)?;
    let payments = services.records::<Payment>().list_active(tenant.tenant_id()).await?;
    Ok(dto::items(payment_totals(&payments)))
}

/// POST /payments
pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PAYMENTS_WRITE)?;
    let now = Utc::now();
    let contract = services
        .require::<Contract>(tenant.tenant_id(), body.contract_id, "contract")
        .await?;
    if !contract.is_active {
        return Err(DomainError::not_found("contract").into());
    }
    if let Some(person_id) = body.person_id {
        let person = services.require::<Person>(tenant.tenant_id(), person_id, "person").await?;
        if !person.is_active {
            return Err(DomainError::not_found("person").into());
        }
    }

    let payment = Payment::record(
        tenant.tenant_id(),
        contract.id,
        body.person_id,
        body.amount,
        body.paid_on,
        &body.reference,
        body.method,
        body.notes,
        now,
    )?;

    let mut batch = WriteBatch::new();
    batch.put(&payment)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "payment.create",
        "payment",
        payment.id,
        None,
        Some(&payment),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        payment_id = %payment.id,
        contract_id = %contract.id,
        "payment recorded"
    );
    Ok(dto::created(payment))
}

/// DELETE /payments/:id - void
pub async fn void_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PAYMENTS_WRITE)?;
    let now = Utc::now();
    let id: PaymentId = dto::parse_id(&id)?;
    let mut payment = services.require::<Payment>(tenant.tenant_id(), id, "payment").await?;
    let before = payment.clone();
    payment.void()?;

    let mut batch = WriteBatch::new();
    batch.put(&payment)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "payment.void",
        "payment",
        payment.id,
        Some(&before),
        Some(&payment),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(payment))
}
