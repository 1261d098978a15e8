use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;

use caretrack_auth::permissions::{ORGANISATION_READ, SEATS_REQUEST, USERS_WRITE};
use caretrack_core::DomainError;
use caretrack_infra::WriteBatch;
use caretrack_organisations::{Organisation, SeatChangeRequest};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_organisation).put(rename_organisation))
        .route("/seats", get(list_seat_requests).post(request_seats))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

pub(crate) async fn load_organisation(services: &AppServices, tenant: &TenantContext) -> ApiResult<Organisation> {
    services
        .require::<Organisation>(tenant.tenant_id(), tenant.tenant_id(), "organisation")
        .await
}

/// GET /organisation
pub async fn get_organisation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &ORGANISATION_READ)?;
    let organisation = load_organisation(&services, &tenant).await?;
    Ok(dto::ok(serde_json::json!({
        "organisation": organisation,
        "seats_available": organisation.seats_available(),
    })))
}

/// PUT /organisation - rename
pub async fn rename_organisation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<RenameRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_WRITE)?;
    let now = Utc::now();
    let mut organisation = load_organisation(&services, &tenant).await?;
    let before = organisation.clone();
    organisation.rename(&body.name, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&organisation)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "organisation.rename",
        "organisation",
        organisation.id,
        Some(&before),
        Some(&organisation),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(organisation))
}

/// GET /organisation/seats - this organisation's seat change requests
pub async fn list_seat_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &ORGANISATION_READ)?;
    let mut requests = services
        .records::<SeatChangeRequest>()
        .list(tenant.tenant_id())
        .await?;
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(dto::items(requests))
}

/// POST /organisation/seats - ask the platform operator for a new seat limit
pub async fn request_seats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::SeatChangeBody>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &SEATS_REQUEST)?;
    let now = Utc::now();
    let organisation = load_organisation(&services, &tenant).await?;

    let pending = services
        .records::<SeatChangeRequest>()
        .list(tenant.tenant_id())
        .await?
        .iter()
        .any(|r| r.status == caretrack_organisations::SeatRequestStatus::Pending);
    if pending {
        return Err(DomainError::conflict("a seat change request is already pending").into());
    }

    let request = SeatChangeRequest::new(
        &organisation,
        body.requested_seats,
        body.reason,
        principal.principal_id(),
        now,
    )?;

    let mut batch = WriteBatch::new();
    batch.put(&request)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "seats.request",
        "seat_change_request",
        request.id,
        None,
        Some(&request),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        request_id = %request.id,
        requested = request.requested_seats,
        "seat change requested"
    );
    Ok(dto::created(request))
}
