//! Read access to the tenant's audit log.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    routing::get,
};

use caretrack_auth::permissions::AUDIT_READ;
use caretrack_infra::{AuditEntry, AuditFilter};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/", get(list_audit))
}

/// GET /audit?entity_type=&entity_id=&actor=&limit= - newest first
pub async fn list_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<AuditFilter>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &AUDIT_READ)?;
    let entries = services.records::<AuditEntry>().list(tenant.tenant_id()).await?;
    Ok(dto::items(filter.apply(entries)))
}
