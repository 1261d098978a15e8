//! Contracts: CRUD with approval gating.
//!
//! A create, update or delete that matches an approval rule the caller
//! cannot satisfy is parked as an `ApprovalRequest` (202) instead of being
//! applied. [`apply_approved`] replays it once someone qualified approves.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use caretrack_approvals::{ApprovalAction, ApprovalRequest};
use caretrack_auth::permissions::{CONTRACTS_READ, CONTRACTS_WRITE};
use caretrack_contracts::{Contract, ContractDraft, ContractType, LocalAuthority, ensure_unique_reference};
use caretrack_core::{ContractId, DomainError, TenantId, UserId};
use caretrack_infra::{Record, WriteBatch};
use caretrack_people::Person;
use caretrack_teams::Team;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::approvals::{blocking_rule, park_change};
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

/// Entity type name used in approval rules and audit entries.
pub const ENTITY_TYPE: &str = "contract";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_contracts).post(create_contract))
        .route("/:id", get(get_contract).put(update_contract).delete(delete_contract))
}

async fn ensure_active<R: Record>(
    services: &AppServices,
    tenant_id: TenantId,
    id: Option<R::Id>,
    what: &'static str,
) -> ApiResult<()> {
    if let Some(id) = id {
        let found = services.records::<R>().get(tenant_id, id).await?;
        if !found.is_some_and(|r| r.is_active()) {
            return Err(DomainError::validation(format!("{what} does not exist")).into());
        }
    }
    Ok(())
}

/// Every referenced row must exist and be active in the same tenant.
async fn ensure_references(services: &AppServices, tenant_id: TenantId, draft: &ContractDraft) -> ApiResult<()> {
    ensure_active::<ContractType>(services, tenant_id, Some(draft.contract_type_id), "contract type").await?;
    ensure_active::<LocalAuthority>(services, tenant_id, Some(draft.local_authority_id), "local authority").await?;
    ensure_active::<Person>(services, tenant_id, draft.person_id, "person").await?;
    ensure_active::<Team>(services, tenant_id, draft.team_id, "team").await?;
    Ok(())
}

fn stage(
    batch: &mut WriteBatch,
    actor: UserId,
    action: &str,
    before: Option<&Contract>,
    after: &Contract,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    batch.put(after)?;
    audit(batch, after.tenant_id, Some(actor), action, ENTITY_TYPE, after.id, before, Some(after), now)?;
    Ok(())
}

/// GET /contracts?status=&expiring_within=&q=
pub async fn list_contracts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ContractListQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &CONTRACTS_READ)?;
    if query
        .expiring_within
        .is_some_and(|days| !(0..=dto::MAX_EXPIRY_WINDOW_DAYS).contains(&days))
    {
        return Err(DomainError::validation(format!(
            "expiring_within must be between 0 and {} days",
            dto::MAX_EXPIRY_WINDOW_DAYS
        ))
        .into());
    }
    let today = Utc::now().date_naive();
    let needle = query.q.as_deref().map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());

    let mut contracts: Vec<Contract> = services
        .records::<Contract>()
        .list_active(tenant.tenant_id())
        .await?
        .into_iter()
        .filter(|c| query.status.is_none_or(|s| c.status == s))
        .filter(|c| query.expiring_within.is_none_or(|days| c.is_expiring_within(days, today)))
        .filter(|c| {
            needle.as_deref().is_none_or(|q| {
                c.title.to_lowercase().contains(q) || c.reference.to_lowercase().contains(q)
            })
        })
        .collect();
    contracts.sort_by(|a, b| a.reference.cmp(&b.reference));
    Ok(dto::items(contracts))
}

/// GET /contracts/:id
pub async fn get_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &CONTRACTS_READ)?;
    let id: ContractId = dto::parse_id(&id)?;
    let contract = services.require::<Contract>(tenant.tenant_id(), id, "contract").await?;
    if !contract.is_active {
        return Err(DomainError::not_found("contract").into());
    }
    Ok(dto::ok(contract))
}

/// POST /contracts
pub async fn create_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(draft): Json<ContractDraft>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &CONTRACTS_WRITE)?;
    let now = Utc::now();
    ensure_references(&services, tenant.tenant_id(), &draft).await?;
    let contract = Contract::create(tenant.tenant_id(), draft.clone(), now)?;
    let existing = services.records::<Contract>().list(tenant.tenant_id()).await?;
    ensure_unique_reference(&existing, &contract.reference, None)?;

    if let Some(rule) = blocking_rule(&services, &tenant, &principal, ENTITY_TYPE, &[], ApprovalAction::Create).await? {
        return park_change(
            &services,
            &principal,
            &rule,
            ENTITY_TYPE,
            contract.id.into(),
            ApprovalAction::Create,
            serde_json::to_value(&draft)?,
            now,
        )
        .await;
    }

    let mut batch = WriteBatch::new();
    stage(&mut batch, principal.principal_id(), "contract.create", None, &contract, now)?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), contract_id = %contract.id, "contract created");
    Ok(dto::created(contract))
}

/// PUT /contracts/:id - full update
pub async fn update_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(draft): Json<ContractDraft>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &CONTRACTS_WRITE)?;
    let now = Utc::now();
    let id: ContractId = dto::parse_id(&id)?;
    let current = services.require::<Contract>(tenant.tenant_id(), id, "contract").await?;

    ensure_references(&services, tenant.tenant_id(), &draft).await?;
    let updated = current.updated(draft.clone(), now)?;
    let existing = services.records::<Contract>().list(tenant.tenant_id()).await?;
    ensure_unique_reference(&existing, &updated.reference, Some(id))?;

    let changed = current.changed_fields(&updated);
    if changed.is_empty() {
        return Ok(dto::ok(current));
    }

    if let Some(rule) = blocking_rule(&services, &tenant, &principal, ENTITY_TYPE, &changed, ApprovalAction::Update).await? {
        return park_change(
            &services,
            &principal,
            &rule,
            ENTITY_TYPE,
            id.into(),
            ApprovalAction::Update,
            serde_json::to_value(&draft)?,
            now,
        )
        .await;
    }

    let mut batch = WriteBatch::new();
    stage(&mut batch, principal.principal_id(), "contract.update", Some(&current), &updated, now)?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), contract_id = %id, fields = ?changed, "contract updated");
    Ok(dto::ok(updated))
}

/// DELETE /contracts/:id - soft delete
pub async fn delete_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &CONTRACTS_WRITE)?;
    let now = Utc::now();
    let id: ContractId = dto::parse_id(&id)?;
    let current = services.require::<Contract>(tenant.tenant_id(), id, "contract").await?;
    let mut deleted = current.clone();
    deleted.soft_delete(now)?;

    if let Some(rule) = blocking_rule(&services, &tenant, &principal, ENTITY_TYPE, &[], ApprovalAction::Delete).await? {
        return park_change(
            &services,
            &principal,
            &rule,
            ENTITY_TYPE,
            id.into(),
            ApprovalAction::Delete,
            JsonValue::Null,
            now,
        )
        .await;
    }

    let mut batch = WriteBatch::new();
    stage(&mut batch, principal.principal_id(), "contract.delete", Some(&current), &deleted, now)?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), contract_id = %id, "contract deleted");
    Ok(dto::ok(deleted))
}

/// Stage the change an approved request describes. Validation runs again
/// against current data; the request may have waited a while.
pub(crate) async fn apply_approved(
    services: &AppServices,
    request: &ApprovalRequest,
    actor: UserId,
    now: DateTime<Utc>,
    batch: &mut WriteBatch,
) -> ApiResult<Contract> {
    let tenant_id = request.tenant_id;
    let id = ContractId::from_uuid(request.entity_id);
    let existing = services.records::<Contract>().list(tenant_id).await?;
    let current = existing.iter().find(|c| c.id == id).cloned();

    let proposed_draft = || -> ApiResult<ContractDraft> {
        serde_json::from_value(request.proposed.clone())
            .map_err(|e| DomainError::invariant(format!("stored proposal is unreadable: {e}")).into())
    };

    match (request.action, current) {
        (ApprovalAction::Create, None) => {
            let draft = proposed_draft()?;
            ensure_references(services, tenant_id, &draft).await?;
            let contract = Contract {
                id,
                ..Contract::create(tenant_id, draft, now)?
            };
            ensure_unique_reference(&existing, &contract.reference, None)?;
            stage(batch, actor, "contract.create", None, &contract, now)?;
            Ok(contract)
        }
        (ApprovalAction::Update, Some(current)) => {
            let draft = proposed_draft()?;
            ensure_references(services, tenant_id, &draft).await?;
            let updated = current.updated(draft, now)?;
            ensure_unique_reference(&existing, &updated.reference, Some(id))?;
            stage(batch, actor, "contract.update", Some(&current), &updated, now)?;
            Ok(updated)
        }
        (ApprovalAction::Delete, Some(current)) => {
            let mut deleted = current.clone();
            deleted.soft_delete(now)?;
            stage(batch, actor, "contract.delete", Some(&current), &deleted, now)?;
            Ok(deleted)
        }
        (ApprovalAction::Create, Some(_)) => Err(DomainError::conflict("contract has already been created").into()),
        (_, None) => Err(ApiError::Domain(DomainError::not_found("contract"))),
        (ApprovalAction::Any, Some(_)) => Err(DomainError::invariant("approval request has no concrete action").into()),
    }
}
