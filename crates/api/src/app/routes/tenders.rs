//! Tender applications, monitoring preferences and feed opportunities.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::{get, post},
};
use chrono::Utc;

use caretrack_auth::permissions::{TENDERS_READ, TENDERS_WRITE};
use caretrack_core::{DomainError, OpportunityId, TenderId};
use caretrack_infra::WriteBatch;
use caretrack_tenders::{
    MonitoringSettings, TenderApplication, TenderDraft, TenderMonitoringPreference, TenderOpportunity,
};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tenders).post(create_tender))
        .route("/preferences", get(get_preferences).put(put_preferences))
        .route("/opportunities", get(list_opportunities))
        .route("/opportunities/:id/dismiss", post(dismiss_opportunity))
        .route("/check", post(check_now))
        .route("/:id", get(get_tender).put(update_tender))
        .route("/:id/status", post(transition_tender))
}

// ─────────────────────────────────────────────────────────────────────────────
// Applications
// ─────────────────────────────────────────────────────────────────────────────

/// GET /tenders?status= - soonest deadline first, undated last
pub async fn list_tenders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::TenderListQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_READ)?;
    let mut tenders: Vec<TenderApplication> = services
        .records::<TenderApplication>()
        .list(tenant.tenant_id())
        .await?
        .into_iter()
        .filter(|t| query.status.is_none_or(|s| t.status == s))
        .collect();
    tenders.sort_by_key(|t| (t.deadline.is_none(), t.deadline, t.created_at));
    Ok(dto::items(tenders))
}

/// GET /tenders/:id
pub async fn get_tender(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_READ)?;
    let id: TenderId = dto::parse_id(&id)?;
    let tender = services.require::<TenderApplication>(tenant.tenant_id(), id, "tender").await?;
    Ok(dto::ok(tender))
}

/// POST /tenders - optionally from a discovered opportunity
pub async fn create_tender(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateTenderRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_WRITE)?;
    let now = Utc::now();
    if let Some(opportunity_id) = body.opportunity_id {
        services
            .require::<TenderOpportunity>(tenant.tenant_id(), opportunity_id, "tender opportunity")
            .await?;
    }
    let tender = TenderApplication::create(tenant.tenant_id(), body.draft, body.opportunity_id, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&tender)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "tender.create",
        "tender",
        tender.id,
        None,
        Some(&tender),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), tender_id = %tender.id, "tender created");
    Ok(dto::created(tender))
}

/// PUT /tenders/:id - open tenders only
pub async fn update_tender(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(draft): Json<TenderDraft>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_WRITE)?;
    let now = Utc::now();
    let id: TenderId = dto::parse_id(&id)?;
    let mut tender = services.require::<TenderApplication>(tenant.tenant_id(), id, "tender").await?;
    let before = tender.clone();
    tender.update(draft, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&tender)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "tender.update",
        "tender",
        tender.id,
        Some(&before),
        Some(&tender),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(tender))
}

/// POST /tenders/:id/status
pub async fn transition_tender(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransitionRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_WRITE)?;
    let now = Utc::now();
    let id: TenderId = dto::parse_id(&id)?;
    let mut tender = services.require::<TenderApplication>(tenant.tenant_id(), id, "tender").await?;
    let before = tender.clone();
    tender.transition(body.status, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&tender)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "tender.transition",
        "tender",
        tender.id,
        Some(&before),
        Some(&tender),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        tender_id = %tender.id,
        from = before.status.as_str(),
        to = tender.status.as_str(),
        "tender status changed"
    );
    Ok(dto::ok(tender))
}

// ─────────────────────────────────────────────────────────────────────────────
// Monitoring
// ─────────────────────────────────────────────────────────────────────────────

async fn load_preference(
    services: &AppServices,
    tenant: &TenantContext,
) -> ApiResult<Option<TenderMonitoringPreference>> {
    let mut prefs = services
        .records::<TenderMonitoringPreference>()
        .list(tenant.tenant_id())
        .await?;
    prefs.sort_by_key(|p| p.updated_at);
    Ok(prefs.pop())
}

/// GET /tenders/preferences
pub async fn get_preferences(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_READ)?;
    let preference = load_preference(&services, &tenant)
        .await?
        .ok_or(DomainError::not_found("tender monitoring preference"))?;
    Ok(dto::ok(preference))
}

/// PUT /tenders/preferences - create or replace
pub async fn put_preferences(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(settings): Json<MonitoringSettings>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_WRITE)?;
    let now = Utc::now();
    let before = load_preference(&services, &tenant).await?;
    let preference = match before.clone() {
        Some(mut existing) => {
            existing.apply(settings, now)?;
            existing
        }
        None => TenderMonitoringPreference::new(tenant.tenant_id(), settings, now)?,
    };

    let mut batch = WriteBatch::new();
    batch.put(&preference)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "tender_preference.save",
        "tender_preference",
        preference.id,
        before.as_ref(),
        Some(&preference),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(preference))
}

/// GET /tenders/opportunities - undismissed, newest first
pub async fn list_opportunities(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_READ)?;
    let mut opportunities = services
        .records::<TenderOpportunity>()
        .list_active(tenant.tenant_id())
        .await?;
    opportunities.sort_by(|a, b| b.discovered_at.cmp(&a.discovered_at));
    Ok(dto::items(opportunities))
}

/// POST /tenders/opportunities/:id/dismiss
pub async fn dismiss_opportunity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_WRITE)?;
    let now = Utc::now();
    let id: OpportunityId = dto::parse_id(&id)?;
    let mut opportunity = services
        .require::<TenderOpportunity>(tenant.tenant_id(), id, "tender opportunity")
        .await?;
    let before = opportunity.clone();
    opportunity.dismiss()?;

    let mut batch = WriteBatch::new();
    batch.put(&opportunity)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "tender_opportunity.dismiss",
        "tender_opportunity",
        opportunity.id,
        Some(&before),
        Some(&opportunity),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(opportunity))
}

/// POST /tenders/check - poll the feed for this organisation now
pub async fn check_now(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TENDERS_WRITE)?;
    let check = services.tender_check().run_for(tenant.tenant_id(), Utc::now()).await?;
    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        new_opportunities = check.new_opportunities.len(),
        notified = check.notified,
        "tender check finished"
    );
    Ok(dto::ok(check))
}
