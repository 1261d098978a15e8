//! Teams, membership and bulk import.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::{HeaderMap, header},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};

use caretrack_auth::User;
use caretrack_auth::permissions::{TEAMS_READ, TEAMS_WRITE};
use caretrack_core::{DomainError, TeamId, TenantId, UserId};
use caretrack_infra::WriteBatch;
use caretrack_teams::{
    Team, TeamDetails, TeamMember, ensure_no_cycle, ensure_unique_team_name, parse_csv, parse_json, plan_import,
};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_teams).post(create_team))
        .route("/import", post(import_teams))
        .route("/:id", get(get_team).put(update_team))
        .route("/:id/deactivate", post(deactivate_team))
        .route("/:id/members", get(list_members).post(add_member))
        .route("/:id/members/:user_id", delete(remove_member))
}

async fn load_active(services: &AppServices, tenant_id: TenantId, raw_id: &str) -> ApiResult<Team> {
    let id: TeamId = dto::parse_id(raw_id)?;
    let team = services.require::<Team>(tenant_id, id, "team").await?;
    if !team.is_active {
        return Err(DomainError::not_found("team").into());
    }
    Ok(team)
}

fn stage(
    batch: &mut WriteBatch,
    actor: UserId,
    action: &str,
    before: Option<&Team>,
    team: &Team,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    batch.put(team)?;
    audit(batch, team.tenant_id, Some(actor), action, "team", team.id, before, Some(team), now)?;
    Ok(())
}

/// The parent must be an active team of the same tenant.
fn ensure_parent(teams: &[Team], parent: Option<TeamId>) -> ApiResult<()> {
    if let Some(parent) = parent {
        if !teams.iter().any(|t| t.id == parent && t.is_active) {
            return Err(DomainError::validation("parent team does not exist").into());
        }
    }
    Ok(())
}

/// GET /teams
pub async fn list_teams(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::IncludeInactiveQuery>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TEAMS_READ)?;
    let records = services.records::<Team>();
    let mut teams = if query.include_inactive {
        records.list(tenant.tenant_id()).await?
    } else {
        records.list_active(tenant.tenant_id()).await?
    };
    teams.sort_by_key(|t| t.name.to_lowercase());
    Ok(dto::items(teams))
}

/// GET /teams/:id
pub async fn get_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TEAMS_READ)?;
    let team = load_active(&services, tenant.tenant_id(), &id).await?;
    Ok(dto::ok(team))
}

/// POST /teams
pub async fn create_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(details): Json<TeamDetails>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TEAMS_WRITE)?;
    let now = Utc::now();
    let teams = services.records::<Team>().list(tenant.tenant_id()).await?;
    ensure_unique_team_name(&teams, &details.name, None)?;
    ensure_parent(&teams, details.parent_team_id)?;
    let team = Team::create(tenant.tenant_id(), details, now)?;

    let mut batch = WriteBatch::new();
    stage(&mut batch, principal.principal_id(), "team.create", None, &team, now)?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), team_id = %team.id, "team created");
    Ok(dto::created(team))
}

/// PUT /teams/:id - rename, describe or move in the hierarchy
pub async fn update_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(details): Json<TeamDetails>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TEAMS_WRITE)?;
    let now = Utc::now();
    let mut team = load_active(&services, tenant.tenant_id(), &id).await?;
    let teams = services.records::<Team>().list(tenant.tenant_id()).await?;
    ensure_unique_team_name(&teams, &details.name, Some(team.id))?;
    ensure_parent(&teams, details.parent_team_id)?;
    ensure_no_cycle(&teams, team.id, details.parent_team_id)?;

    let before = team.clone();
    team.update(details, now)?;

    let mut batch = WriteBatch::new();
    stage(&mut batch, principal.principal_id(), "team.update", Some(&before), &team, now)?;
    services.commit(batch).await?;
    Ok(dto::ok(team))
}

/// POST /teams/:id/deactivate - also ends every active membership
pub async fn deactivate_team(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TEAMS_WRITE)?;
    let now = Utc::now();
    let mut team = load_active(&services, tenant.tenant_id(), &id).await?;
    let teams = services.records::<Team>().list_active(tenant.tenant_id()).await?;
    if teams.iter().any(|t| t.parent_team_id == Some(team.id)) {
        return Err(DomainError::invariant("move or deactivate the sub-teams first").into());
    }
    let before = team.clone();
    team.deactivate(now)?;

    let mut batch = WriteBatch::new();
    stage(&mut batch, principal.principal_id(), "team.deactivate", Some(&before), &team, now)?;
    let memberships = services.records::<TeamMember>().list_active(tenant.tenant_id()).await?;
    let mut ended = 0usize;
    for mut membership in memberships.into_iter().filter(|m| m.team_id == team.id) {
        membership.leave()?;
        batch.put(&membership)?;
        ended += 1;
    }
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), team_id = %team.id, memberships_ended = ended, "team deactivated");
    Ok(dto::ok(team))
}

// ─────────────────────────────────────────────────────────────────────────────
// Members
// ─────────────────────────────────────────────────────────────────────────────

/// GET /teams/:id/members
pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TEAMS_READ)?;
    let team = load_active(&services, tenant.tenant_id(), &id).await?;
    let mut members: Vec<TeamMember> = services
        .records::<TeamMember>()
        .list_active(tenant.tenant_id())
        .await?
        .into_iter()
        .filter(|m| m.team_id == team.id)
        .collect();
    members.sort_by_key(|m| m.joined_at);
    Ok(dto::items(members))
}

/// POST /teams/:id/members
pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddMemberRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TEAMS_WRITE)?;
    let now = Utc::now();
    let team = load_active(&services, tenant.tenant_id(), &id).await?;
    let user = services.require::<User>(tenant.tenant_id(), body.user_id, "user").await?;
    if !user.is_active {
        return Err(DomainError::validation("inactive users cannot join a team").into());
    }

    let existing = services.records::<TeamMember>().list(tenant.tenant_id()).await?;
    let member = TeamMember::join(&existing, tenant.tenant_id(), team.id, user.id, body.role, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&member)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "team.add_member",
        "team_member",
        member.id,
        None,
        Some(&member),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), team_id = %team.id, user_id = %user.id, "team member added");
    Ok(dto::created(member))
}

/// DELETE /teams/:id/members/:user_id
pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TEAMS_WRITE)?;
    let now = Utc::now();
    let team_id: TeamId = dto::parse_id(&id)?;
    let user_id: UserId = dto::parse_id(&user_id)?;
    let mut member = services
        .records::<TeamMember>()
        .list_active(tenant.tenant_id())
        .await?
        .into_iter()
        .find(|m| m.team_id == team_id && m.user_id == user_id)
        .ok_or(DomainError::not_found("team membership"))?;
    let before = member.clone();
    member.leave()?;

    let mut batch = WriteBatch::new();
    batch.put(&member)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "team.remove_member",
        "team_member",
        member.id,
        Some(&before),
        Some(&member),
        now,
    )?;
    services.commit(batch).await?;
    Ok(dto::ok(member))
}

// ─────────────────────────────────────────────────────────────────────────────
// Import
// ─────────────────────────────────────────────────────────────────────────────

/// POST /teams/import[?dry_run=true]
///
/// CSV by default; a JSON content type switches to a JSON array of rows.
/// Valid rows are created even when others are reported as errors.
pub async fn import_teams(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ImportQuery>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &TEAMS_WRITE)?;
    let now = Utc::now();
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));
    let rows = if is_json { parse_json(&body)? } else { parse_csv(&body)? };

    let existing = services.records::<Team>().list(tenant.tenant_id()).await?;
    let plan = plan_import(&existing, rows);
    if query.dry_run {
        return Ok(dto::ok(serde_json::json!({
            "dry_run": true,
            "to_create": plan.to_create,
            "skipped": plan.skipped,
            "errors": plan.errors,
        })));
    }

    let created = plan.materialize(tenant.tenant_id(), now)?;
    if !created.is_empty() {
        let mut batch = WriteBatch::new();
        for team in &created {
            stage(&mut batch, principal.principal_id(), "team.import", None, team, now)?;
        }
        services.commit(batch).await?;
    }

    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        created = created.len(),
        skipped = plan.skipped.len(),
        errors = plan.errors.len(),
        "team import finished"
    );
    Ok(dto::ok(serde_json::json!({
        "dry_run": false,
        "created": created,
        "skipped": plan.skipped,
        "errors": plan.errors,
    })))
}
