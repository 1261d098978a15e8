//! The tenant's glossary of terms, also used by the assistant.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::get,
};
use chrono::Utc;

use caretrack_assistant::{GlossaryDraft, GlossaryTerm, ensure_unique_term, search};
use caretrack_auth::permissions::{ASSISTANT_USE, GLOSSARY_WRITE};
use caretrack_core::GlossaryTermId;
use caretrack_infra::WriteBatch;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_terms).post(create_term))
        .route("/:id", get(get_term).put(update_term).delete(delete_term))
}

/// GET /glossary?q=
pub async fn list_terms(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::SearchQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &ASSISTANT_USE)?;
    let terms = services.records::<GlossaryTerm>().list(tenant.tenant_id()).await?;
    let hits: Vec<GlossaryTerm> = search(&terms, query.q.as_deref().unwrap_or_default())
        .into_iter()
        .cloned()
        .collect();
    Ok(dto::items(hits))
}

/// GET /glossary/:id
pub async fn get_term(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &ASSISTANT_USE)?;
    let id: GlossaryTermId = dto::parse_id(&id)?;
    let term = services.require::<GlossaryTerm>(tenant.tenant_id(), id, "glossary term").await?;
    Ok(dto::ok(term))
}

/// POST /glossary
pub async fn create_term(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(draft): Json<GlossaryDraft>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &GLOSSARY_WRITE)?;
    let now = Utc::now();
    let existing = services.records::<GlossaryTerm>().list(tenant.tenant_id()).await?;
    ensure_unique_term(&existing, &draft.term, None)?;
    let term = GlossaryTerm::create(tenant.tenant_id(), draft, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&term)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "glossary.create",
        "glossary_term",
        term.id,
        None,
        Some(&term),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::created(term))
}

/// PUT /glossary/:id
pub async fn update_term(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(draft): Json<GlossaryDraft>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &GLOSSARY_WRITE)?;
    let now = Utc::now();
    let id: GlossaryTermId = dto::parse_id(&id)?;
    let mut term = services.require::<GlossaryTerm>(tenant.tenant_id(), id, "glossary term").await?;
    let existing = services.records::<GlossaryTerm>().list(tenant.tenant_id()).await?;
    ensure_unique_term(&existing, &draft.term, Some(id))?;
    let before = term.clone();
    term.update(draft, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&term)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "glossary.update",
        "glossary_term",
        term.id,
        Some(&before),
        Some(&term),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(term))
}

/// DELETE /glossary/:id - hard delete, the audit entry keeps the last state
pub async fn delete_term(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &GLOSSARY_WRITE)?;
    let now = Utc::now();
    let id: GlossaryTermId = dto::parse_id(&id)?;
    let term = services.require::<GlossaryTerm>(tenant.tenant_id(), id, "glossary term").await?;

    let mut batch = WriteBatch::new();
    batch.delete(&term);
    audit::<GlossaryTerm>(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "glossary.delete",
        "glossary_term",
        term.id,
        Some(&term),
        None,
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(serde_json::json!({ "deleted": term.id })))
}
