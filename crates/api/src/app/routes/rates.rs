//! Versioned rates per (contract type, local authority).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    routing::get,
};
use chrono::Utc;

use caretrack_auth::permissions::{RATES_READ, RATES_WRITE};
use caretrack_contracts::{ContractType, LocalAuthority, Rate, current_rate, plan_rate_version};
use caretrack_core::DomainError;
use caretrack_infra::WriteBatch;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rates).post(add_rate_version))
        .route("/current", get(get_current_rate))
}

/// GET /rates?contract_type_id=&local_authority_id= - full history, newest first per pair
pub async fn list_rates(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::RateListQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &RATES_READ)?;
    let mut rates: Vec<Rate> = services
        .records::<Rate>()
        .list(tenant.tenant_id())
        .await?
        .into_iter()
        .filter(|r| query.contract_type_id.is_none_or(|id| r.contract_type_id == id))
        .filter(|r| query.local_authority_id.is_none_or(|id| r.local_authority_id == id))
        .collect();
    rates.sort_by(|a, b| {
        (a.contract_type_id, a.local_authority_id)
            .cmp(&(b.contract_type_id, b.local_authority_id))
            .then(b.effective_from.cmp(&a.effective_from))
    });
    Ok(dto::items(rates))
}

/// POST /rates - add a version, closing the open one for the pair
pub async fn add_rate_version(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::NewRateRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &RATES_WRITE)?;
    let now = Utc::now();
    let contract_type = services
        .require::<ContractType>(tenant.tenant_id(), body.contract_type_id, "contract type")
        .await?;
    let local_authority = services
        .require::<LocalAuthority>(tenant.tenant_id(), body.local_authority_id, "local authority")
        .await?;
    if !contract_type.is_active || !local_authority.is_active {
        return Err(DomainError::validation("rates can only be set for active reference data").into());
    }

    let existing = services.records::<Rate>().list(tenant.tenant_id()).await?;
    let plan = plan_rate_version(
        &existing,
        tenant.tenant_id(),
        body.contract_type_id,
        body.local_authority_id,
        body.amount,
        body.unit,
        body.effective_from,
        now,
    )?;

    let mut batch = WriteBatch::new();
    batch.put(&plan.new_rate)?;
    if let Some(closed) = &plan.closed_previous {
        let before = existing.iter().find(|r| r.id == closed.id);
        batch.put(closed)?;
        audit(
            &mut batch,
            tenant.tenant_id(),
            Some(principal.principal_id()),
            "rate.close",
            "rate",
            closed.id,
            before,
            Some(closed),
            now,
        )?;
    }
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "rate.create",
        "rate",
        plan.new_rate.id,
        None,
        Some(&plan.new_rate),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        rate_id = %plan.new_rate.id,
        effective_from = %plan.new_rate.effective_from,
        closed_previous = plan.closed_previous.is_some(),
        "rate version added"
    );
    Ok(dto::created(serde_json::json!({
        "rate": plan.new_rate,
        "closed_previous": plan.closed_previous,
    })))
}

/// GET /rates/current?contract_type_id=&local_authority_id=[&on=]
pub async fn get_current_rate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::CurrentRateQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &RATES_READ)?;
    let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
    let rates = services.records::<Rate>().list(tenant.tenant_id()).await?;
    let rate = current_rate(&rates, query.contract_type_id, query.local_authority_id, on)
        .cloned()
        .ok_or(DomainError::not_found("rate"))?;
    Ok(dto::ok(rate))
}
