//! People supported under contracts.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};

use caretrack_auth::permissions::{PEOPLE_READ, PEOPLE_WRITE};
use caretrack_core::{DomainError, PersonId, TenantId, UserId};
use caretrack_infra::WriteBatch;
use caretrack_people::{IdentifierKind, Person, PersonDetails, PersonIdentifier, ensure_identifier_unique};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_people).post(create_person))
        .route("/:id", get(get_person).put(update_person).delete(delete_person))
        .route("/:id/identifiers", post(add_identifier))
        .route("/:id/identifiers/:kind/:value", delete(remove_identifier))
}

async fn load_active(services: &AppServices, tenant_id: TenantId, raw_id: &str) -> ApiResult<Person> {
    let id: PersonId = dto::parse_id(raw_id)?;
    let person = services.require::<Person>(tenant_id, id, "person").await?;
    if !person.is_active {
        return Err(DomainError::not_found("person").into());
    }
    Ok(person)
}

async fn save(
    services: &AppServices,
    actor: UserId,
    action: &str,
    before: Option<&Person>,
    person: &Person,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    let mut batch = WriteBatch::new();
    batch.put(person)?;
    audit(&mut batch, person.tenant_id, Some(actor), action, "person", person.id, before, Some(person), now)?;
    services.commit(batch).await?;
    Ok(())
}

/// GET /people?q= - name or identifier search
pub async fn list_people(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::SearchQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PEOPLE_READ)?;
    let q = query.q.unwrap_or_default();
    let mut people: Vec<Person> = services
        .records::<Person>()
        .list_active(tenant.tenant_id())
        .await?
        .into_iter()
        .filter(|p| p.matches_query(&q))
        .collect();
    people.sort_by(|a, b| {
        (a.last_name.to_lowercase(), a.first_name.to_lowercase())
            .cmp(&(b.last_name.to_lowercase(), b.first_name.to_lowercase()))
    });
    Ok(dto::items(people))
}

/// GET /people/:id
pub async fn get_person(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PEOPLE_READ)?;
    let person = load_active(&services, tenant.tenant_id(), &id).await?;
    Ok(dto::ok(person))
}

/// POST /people - details plus any identifiers
pub async fn create_person(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreatePersonRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PEOPLE_WRITE)?;
    let now = Utc::now();
    let mut person = Person::create(tenant.tenant_id(), body.details, now)?;

    let existing = services.records::<Person>().list_active(tenant.tenant_id()).await?;
    for raw in &body.identifiers {
        let identifier = PersonIdentifier::new(raw.kind, &raw.value)?;
        ensure_identifier_unique(&existing, &identifier, person.id)?;
        person.add_identifier(identifier, now)?;
    }

    save(&services, principal.principal_id(), "person.create", None, &person, now).await?;
    tracing::info!(tenant_id = %tenant.tenant_id(), person_id = %person.id, "person created");
    Ok(dto::created(person))
}

/// PUT /people/:id - replace the details; identifiers are managed separately
pub async fn update_person(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(details): Json<PersonDetails>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PEOPLE_WRITE)?;
    let now = Utc::now();
    let mut person = load_active(&services, tenant.tenant_id(), &id).await?;
    let before = person.clone();
    person.update(details, now)?;

    save(&services, principal.principal_id(), "person.update", Some(&before), &person, now).await?;
    Ok(dto::ok(person))
}

/// DELETE /people/:id - soft delete
pub async fn delete_person(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PEOPLE_WRITE)?;
    let now = Utc::now();
    let mut person = load_active(&services, tenant.tenant_id(), &id).await?;
    let before = person.clone();
    person.soft_delete(now)?;

    save(&services, principal.principal_id(), "person.delete", Some(&before), &person, now).await?;
    tracing::info!(tenant_id = %tenant.tenant_id(), person_id = %person.id, "person removed");
    Ok(dto::ok(person))
}

/// POST /people/:id/identifiers
pub async fn add_identifier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::IdentifierBody>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PEOPLE_WRITE)?;
    let now = Utc::now();
    let mut person = load_active(&services, tenant.tenant_id(), &id).await?;
    let identifier = PersonIdentifier::new(body.kind, &body.value)?;
    let existing = services.records::<Person>().list_active(tenant.tenant_id()).await?;
    ensure_identifier_unique(&existing, &identifier, person.id)?;

    let before = person.clone();
    person.add_identifier(identifier, now)?;
    save(&services, principal.principal_id(), "person.add_identifier", Some(&before), &person, now).await?;
    Ok(dto::created(person))
}

/// DELETE /people/:id/identifiers/:kind/:value
pub async fn remove_identifier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, kind, value)): Path<(String, IdentifierKind, String)>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &PEOPLE_WRITE)?;
    let now = Utc::now();
    let mut person = load_active(&services, tenant.tenant_id(), &id).await?;
    let before = person.clone();
    person.remove_identifier(kind, &value, now)?;

    save(&services, principal.principal_id(), "person.remove_identifier", Some(&before), &person, now).await?;
    Ok(dto::ok(person))
}
