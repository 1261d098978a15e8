//! Approval rules and the requests parked behind them.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use caretrack_approvals::{
    ApprovalAction, ApprovalRequest, ApprovalRule, ApprovalRuleDraft, can_approve, find_rule_for_fields,
};
use caretrack_auth::permissions::{APPROVALS_CONFIGURE, APPROVALS_DECIDE, APPROVALS_READ};
use caretrack_core::{ApprovalRequestId, ApprovalRuleId, DomainError};
use caretrack_infra::WriteBatch;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::contracts;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/:id/deactivate", post(deactivate_rule))
        .route("/requests", get(list_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/approve", post(approve_request))
        .route("/requests/:id/reject", post(reject_request))
}

/// The rule a change must wait on, or `None` when the caller may apply it
/// straight away (no rule matches, or the caller satisfies it).
pub(crate) async fn blocking_rule(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    entity_type: &str,
    fields: &[&str],
    action: ApprovalAction,
) -> ApiResult<Option<ApprovalRule>> {
    let rules = services.records::<ApprovalRule>().list_active(tenant.tenant_id()).await?;
    let Some(rule) = find_rule_for_fields(&rules, entity_type, fields, action) else {
        return Ok(None);
    };
    let level = services.manager_level(tenant.tenant_id(), principal.principal_id()).await?;
    if can_approve(rule, principal.roles(), level) {
        return Ok(None);
    }
    Ok(Some(rule.clone()))
}

/// Store an approval request instead of the change and answer 202.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn park_change(
    services: &AppServices,
    principal: &PrincipalContext,
    rule: &ApprovalRule,
    entity_type: &str,
    entity_id: Uuid,
    action: ApprovalAction,
    proposed: JsonValue,
    now: DateTime<Utc>,
) -> ApiResult<axum::response::Response> {
    let request = ApprovalRequest::open(
        rule,
        entity_type,
        entity_id,
        rule.field.as_deref(),
        action,
        proposed,
        principal.principal_id(),
        now,
    );

    let mut batch = WriteBatch::new();
    batch.put(&request)?;
    audit::<ApprovalRequest>(
        &mut batch,
        request.tenant_id,
        Some(principal.principal_id()),
        "approval.request",
        "approval_request",
        request.id,
        None,
        Some(&request),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(
        tenant_id = %request.tenant_id,
        approval_request_id = %request.id,
        rule_id = %rule.id,
        entity_type,
        "change parked for approval"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "pending_approval", "approval_request": request })),
    )
        .into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules
// ─────────────────────────────────────────────────────────────────────────────

/// GET /approvals/rules - by priority
pub async fn list_rules(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::IncludeInactiveQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &APPROVALS_READ)?;
    let records = services.records::<ApprovalRule>();
    let mut rules = if query.include_inactive {
        records.list(tenant.tenant_id()).await?
    } else {
        records.list_active(tenant.tenant_id()).await?
    };
    rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
    Ok(dto::items(rules))
}

/// POST /approvals/rules
pub async fn create_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(draft): Json<ApprovalRuleDraft>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &APPROVALS_CONFIGURE)?;
    let now = Utc::now();
    let rule = ApprovalRule::create(tenant.tenant_id(), draft, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&rule)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "approval_rule.create",
        "approval_rule",
        rule.id,
        None,
        Some(&rule),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), rule_id = %rule.id, entity_type = %rule.entity_type, "approval rule created");
    Ok(dto::created(rule))
}

/// POST /approvals/rules/:id/deactivate
pub async fn deactivate_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &APPROVALS_CONFIGURE)?;
    let now = Utc::now();
    let id: ApprovalRuleId = dto::parse_id(&id)?;
    let mut rule = services.require::<ApprovalRule>(tenant.tenant_id(), id, "approval rule").await?;
    let before = rule.clone();
    rule.deactivate()?;

    let mut batch = WriteBatch::new();
    batch.put(&rule)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "approval_rule.deactivate",
        "approval_rule",
        rule.id,
        Some(&before),
        Some(&rule),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(rule))
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// GET /approvals/requests?status=&entity_type= - newest first
pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ApprovalListQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &APPROVALS_READ)?;
    let entity_type = query.entity_type.as_deref().map(str::to_lowercase);
    let mut requests: Vec<ApprovalRequest> = services
        .records::<ApprovalRequest>()
        .list(tenant.tenant_id())
        .await?
        .into_iter()
        .filter(|r| query.status.is_none_or(|s| r.status == s))
        .filter(|r| entity_type.as_deref().is_none_or(|t| r.entity_type == t))
        .collect();
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(dto::items(requests))
}

/// GET /approvals/requests/:id
pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &APPROVALS_READ)?;
    let id: ApprovalRequestId = dto::parse_id(&id)?;
    let request = services
        .require::<ApprovalRequest>(tenant.tenant_id(), id, "approval request")
        .await?;
    Ok(dto::ok(request))
}

/// Load a request with the rule that governs it.
async fn load_decision(
    services: &AppServices,
    tenant: &TenantContext,
    raw_id: &str,
) -> ApiResult<(ApprovalRequest, ApprovalRule)> {
    let id: ApprovalRequestId = dto::parse_id(raw_id)?;
    let request = services
        .require::<ApprovalRequest>(tenant.tenant_id(), id, "approval request")
        .await?;
    let rule = services
        .require::<ApprovalRule>(tenant.tenant_id(), request.rule_id, "approval rule")
        .await?;
    Ok((request, rule))
}

/// POST /approvals/requests/:id/approve
///
/// The parked change is applied in the same batch as the decision.
pub async fn approve_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CommentBody>>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &APPROVALS_DECIDE)?;
    let now = Utc::now();
    let (mut request, rule) = load_decision(&services, &tenant, &id).await?;
    let level = services.manager_level(tenant.tenant_id(), principal.principal_id()).await?;
    let before = request.clone();
    let comment = body.and_then(|Json(b)| b.comment);
    request.approve(&rule, principal.principal_id(), principal.roles(), level, comment, now)?;

    let mut batch = WriteBatch::new();
    let applied = match request.entity_type.as_str() {
        contracts::ENTITY_TYPE => {
            let contract =
                contracts::apply_approved(&services, &request, principal.principal_id(), now, &mut batch).await?;
            serde_json::to_value(contract)?
        }
        other => {
            return Err(DomainError::invariant(format!("changes to '{other}' cannot be applied by approval")).into());
        }
    };
    batch.put(&request)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "approval.approve",
        "approval_request",
        request.id,
        Some(&before),
        Some(&request),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        approval_request_id = %request.id,
        entity_type = %request.entity_type,
        entity_id = %request.entity_id,
        "approval request approved"
    );
    Ok(dto::ok(json!({ "request": request, "applied": applied })))
}

/// POST /approvals/requests/:id/reject
pub async fn reject_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CommentBody>>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &APPROVALS_DECIDE)?;
    let now = Utc::now();
    let (mut request, rule) = load_decision(&services, &tenant, &id).await?;
    let level = services.manager_level(tenant.tenant_id(), principal.principal_id()).await?;
    let before = request.clone();
    let comment = body.and_then(|Json(b)| b.comment);
    request.reject(&rule, principal.principal_id(), principal.roles(), level, comment, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&request)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "approval.reject",
        "approval_request",
        request.id,
        Some(&before),
        Some(&request),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), approval_request_id = %request.id, "approval request rejected");
    Ok(dto::ok(request))
}
