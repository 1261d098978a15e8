//! Platform administration: seat change decisions across organisations.
//!
//! Only `superadmin` holds `seats.approve`; these handlers are the one place
//! where records of another tenant are read and written.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::{get, post},
};
use chrono::Utc;

use caretrack_auth::permissions::SEATS_APPROVE;
use caretrack_core::{DomainError, SeatChangeRequestId};
use caretrack_infra::WriteBatch;
use caretrack_organisations::{Organisation, SeatChangeRequest};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::rbac;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/seat-requests", get(list_seat_requests))
        .route("/seat-requests/:id/approve", post(approve_seat_request))
        .route("/seat-requests/:id/reject", post(reject_seat_request))
        .nest("/rbac", rbac::router())
}

async fn find_request(services: &AppServices, id: SeatChangeRequestId) -> ApiResult<SeatChangeRequest> {
    services
        .records::<SeatChangeRequest>()
        .list_all()
        .await?
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| DomainError::not_found("seat change request").into())
}

/// GET /admin/seat-requests?status=
pub async fn list_seat_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::SeatRequestQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &SEATS_APPROVE)?;
    let mut requests: Vec<SeatChangeRequest> = services
        .records::<SeatChangeRequest>()
        .list_all()
        .await?
        .into_iter()
        .filter(|r| query.status.is_none_or(|s| r.status == s))
        .collect();
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(dto::items(requests))
}

/// POST /admin/seat-requests/:id/approve
///
/// Request and organisation are written in one batch.
pub async fn approve_seat_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::DecisionBody>>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &SEATS_APPROVE)?;
    let now = Utc::now();
    let mut request = find_request(&services, dto::parse_id(&id)?).await?;
    let mut organisation = services
        .require::<Organisation>(request.tenant_id, request.tenant_id, "organisation")
        .await?;
    let before = organisation.clone();

    let note = body.and_then(|Json(b)| b.note);
    request.approve(&mut organisation, principal.principal_id(), note, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&request)?.put(&organisation)?;
    audit(
        &mut batch,
        request.tenant_id,
        Some(principal.principal_id()),
        "seats.approve",
        "organisation",
        organisation.id,
        Some(&before),
        Some(&organisation),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(
        tenant_id = %request.tenant_id,
        request_id = %request.id,
        seat_limit = organisation.seat_limit,
        "seat change approved"
    );
    Ok(dto::ok(serde_json::json!({ "request": request, "organisation": organisation })))
}

/// POST /admin/seat-requests/:id/reject
pub async fn reject_seat_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::DecisionBody>>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &SEATS_APPROVE)?;
    let now = Utc::now();
    let mut request = find_request(&services, dto::parse_id(&id)?).await?;
    let before = request.clone();

    let note = body.and_then(|Json(b)| b.note);
    request.reject(principal.principal_id(), note, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&request)?;
    audit(
        &mut batch,
        request.tenant_id,
        Some(principal.principal_id()),
        "seats.reject",
        "seat_change_request",
        request.id,
        Some(&before),
        Some(&request),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %request.tenant_id, request_id = %request.id, "seat change rejected");
    Ok(dto::ok(request))
}
