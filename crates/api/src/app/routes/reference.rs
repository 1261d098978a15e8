//! Per-tenant reference data: contract types and local authorities.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::{get, post},
};
use chrono::Utc;

use caretrack_auth::permissions::{CONTRACTS_READ, REFERENCE_WRITE};
use caretrack_contracts::{ContractType, LocalAuthority, ensure_unique_name};
use caretrack_core::{ContractTypeId, LocalAuthorityId};
use caretrack_infra::WriteBatch;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn contract_types_router() -> Router {
    Router::new()
        .route("/", get(list_contract_types).post(create_contract_type))
        .route("/:id/deactivate", post(deactivate_contract_type))
}

pub fn local_authorities_router() -> Router {
    Router::new()
        .route("/", get(list_local_authorities).post(create_local_authority))
        .route("/:id/deactivate", post(deactivate_local_authority))
}

// ─────────────────────────────────────────────────────────────────────────────
// Contract types
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_contract_types(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::IncludeInactiveQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &CONTRACTS_READ)?;
    let records = services.records::<ContractType>();
    let mut rows = if query.include_inactive {
        records.list(tenant.tenant_id()).await?
    } else {
        records.list_active(tenant.tenant_id()).await?
    };
    rows.sort_by_key(|r| r.name.to_lowercase());
    Ok(dto::items(rows))
}

pub async fn create_contract_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ContractTypeBody>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &REFERENCE_WRITE)?;
    let now = Utc::now();
    let existing = services.records::<ContractType>().list(tenant.tenant_id()).await?;
    ensure_unique_name(
        "contract type",
        existing.iter().map(|r| (r.name.as_str(), r.is_active)),
        &body.name,
    )?;
    let row = ContractType::new(tenant.tenant_id(), &body.name, body.description, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&row)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "contract_type.create",
        "contract_type",
        row.id,
        None,
        Some(&row),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), contract_type_id = %row.id, "contract type created");
    Ok(dto::created(row))
}

pub async fn deactivate_contract_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &REFERENCE_WRITE)?;
    let now = Utc::now();
    let id: ContractTypeId = dto::parse_id(&id)?;
    let mut row = services
        .require::<ContractType>(tenant.tenant_id(), id, "contract type")
        .await?;
    let before = row.clone();
    row.deactivate()?;

    let mut batch = WriteBatch::new();
    batch.put(&row)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "contract_type.deactivate",
        "contract_type",
        row.id,
        Some(&before),
        Some(&row),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(row))
}

// ─────────────────────────────────────────────────────────────────────────────
// Local authorities
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_local_authorities(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::IncludeInactiveQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &CONTRACTS_READ)?;
    let records = services.records::<LocalAuthority>();
    let mut rows = if query.include_inactive {
        records.list(tenant.tenant_id()).await?
    } else {
        records.list_active(tenant.tenant_id()).await?
    };
    rows.sort_by_key(|r| r.name.to_lowercase());
    Ok(dto::items(rows))
}

pub async fn create_local_authority(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::LocalAuthorityBody>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &REFERENCE_WRITE)?;
    let now = Utc::now();
    let existing = services.records::<LocalAuthority>().list(tenant.tenant_id()).await?;
    ensure_unique_name(
        "local authority",
        existing.iter().map(|r| (r.name.as_str(), r.is_active)),
        &body.name,
    )?;
    let row = LocalAuthority::new(tenant.tenant_id(), &body.name, body.code, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&row)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "local_authority.create",
        "local_authority",
        row.id,
        None,
        Some(&row),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), local_authority_id = %row.id, "local authority created");
    Ok(dto::created(row))
}

pub async fn deactivate_local_authority(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &REFERENCE_WRITE)?;
    let now = Utc::now();
    let id: LocalAuthorityId = dto::parse_id(&id)?;
    let mut row = services
        .require::<LocalAuthority>(tenant.tenant_id(), id, "local authority")
        .await?;
    let before = row.clone();
    row.deactivate()?;

    let mut batch = WriteBatch::new();
    batch.put(&row)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "local_authority.deactivate",
        "local_authority",
        row.id,
        Some(&before),
        Some(&row),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(row))
}
