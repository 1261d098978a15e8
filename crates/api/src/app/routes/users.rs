//! User administration within an organisation.
//!
//! Every change to who is active recomputes the organisation's seat count
//! and writes user + organisation in one batch.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};

use caretrack_auth::permissions::{USERS_READ, USERS_WRITE};
use caretrack_auth::{Role, User, hash_password, normalize_email};
use caretrack_core::{DomainError, UserId};
use caretrack_infra::WriteBatch;
use caretrack_organisations::Organisation;

use crate::app::dto::{self, UserView};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::auth::{ensure_email_available, send_verification};
use crate::app::routes::organisation::load_organisation;
use crate::app::services::{AppServices, audit};
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user))
        .route("/:id/role", put(change_role))
        .route("/:id/deactivate", post(deactivate_user))
        .route("/:id/reactivate", post(reactivate_user))
}

fn parse_role(raw: &str) -> ApiResult<Role> {
    Role::parse_known(raw).ok_or_else(|| ApiError::bad_request("invalid_role", format!("unknown role '{}'", raw.trim())))
}

/// Put `user` and the organisation with its seat count recomputed, plus an
/// audit entry, in one batch.
async fn commit_with_seats(
    services: &AppServices,
    mut organisation: Organisation,
    before: Option<&User>,
    user: &User,
    actor: UserId,
    action: &str,
    now: DateTime<Utc>,
) -> ApiResult<Organisation> {
    let mut active = services
        .records::<User>()
        .list_active(organisation.id)
        .await?
        .into_iter()
        .filter(|u| u.id != user.id)
        .count();
    if user.is_active {
        active += 1;
    }
    organisation.recompute_seats(active, now);

    let mut batch = WriteBatch::new();
    batch.put(user)?.put(&organisation)?;
    audit(&mut batch, organisation.id, Some(actor), action, "user", user.id, before, Some(user), now)?;
    services.commit(batch).await?;
    Ok(organisation)
}

/// GET /users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_READ)?;
    let users = services.records::<User>().list(tenant.tenant_id()).await?;
    Ok(dto::items(users.iter().map(UserView::from).collect()))
}

/// GET /users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_READ)?;
    let user = services
        .require::<User>(tenant.tenant_id(), dto::parse_id(&id)?, "user")
        .await?;
    Ok(dto::ok(UserView::from(&user)))
}

/// POST /users - add a user to the organisation (uses a seat)
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateUserRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_WRITE)?;
    let now = Utc::now();
    let role = parse_role(&body.role)?;
    if role.rank() > principal.max_rank() {
        return Err(DomainError::unauthorized(format!("cannot grant role '{role}'")).into());
    }

    let organisation = load_organisation(&services, &tenant).await?;
    organisation.ensure_seat_available()?;

    let email = normalize_email(&body.email)?;
    ensure_email_available(&services, &email).await?;
    let password_hash = hash_password(&body.password)?;
    let user = User::register(tenant.tenant_id(), &email, &body.display_name, role, password_hash, now)?;

    let organisation =
        commit_with_seats(&services, organisation, None, &user, principal.principal_id(), "user.create", now).await?;

    tracing::info!(
        tenant_id = %tenant.tenant_id(),
        user_id = %user.id,
        seats_used = organisation.seats_used,
        "user created"
    );
    let verification_email_sent = send_verification(&services, &user).await;

    Ok(dto::created(serde_json::json!({
        "user": UserView::from(&user),
        "seats_used": organisation.seats_used,
        "seat_limit": organisation.seat_limit,
        "verification_email_sent": verification_email_sent,
    })))
}

/// PUT /users/:id/role
pub async fn change_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeRoleRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_WRITE)?;
    let now = Utc::now();
    let role = parse_role(&body.role)?;
    let mut user = services
        .require::<User>(tenant.tenant_id(), dto::parse_id(&id)?, "user")
        .await?;
    if user.id == principal.principal_id() {
        return Err(DomainError::invariant("you cannot change your own role").into());
    }

    let before = user.clone();
    user.change_role(role, principal.max_rank(), now)?;

    let mut batch = WriteBatch::new();
    batch.put(&user)?;
    audit(
        &mut batch,
        tenant.tenant_id(),
        Some(principal.principal_id()),
        "user.change_role",
        "user",
        user.id,
        Some(&before),
        Some(&user),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), user_id = %user.id, role = %user.role, "role changed");
    Ok(dto::ok(UserView::from(&user)))
}

/// POST /users/:id/deactivate - frees a seat
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_WRITE)?;
    let now = Utc::now();
    let mut user = services
        .require::<User>(tenant.tenant_id(), dto::parse_id(&id)?, "user")
        .await?;
    if user.id == principal.principal_id() {
        return Err(DomainError::invariant("you cannot deactivate yourself").into());
    }
    if user.role.rank() > principal.max_rank() {
        return Err(DomainError::unauthorized("cannot deactivate a more privileged user").into());
    }

    let organisation = load_organisation(&services, &tenant).await?;
    let before = user.clone();
    user.deactivate(now)?;
    let organisation = commit_with_seats(
        &services,
        organisation,
        Some(&before),
        &user,
        principal.principal_id(),
        "user.deactivate",
        now,
    )
    .await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), user_id = %user.id, "user deactivated");
    Ok(dto::ok(serde_json::json!({
        "user": UserView::from(&user),
        "seats_used": organisation.seats_used,
    })))
}

/// POST /users/:id/reactivate - needs a free seat
pub async fn reactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_WRITE)?;
    let now = Utc::now();
    let mut user = services
        .require::<User>(tenant.tenant_id(), dto::parse_id(&id)?, "user")
        .await?;
    if user.role.rank() > principal.max_rank() {
        return Err(DomainError::unauthorized("cannot reactivate a more privileged user").into());
    }

    let organisation = load_organisation(&services, &tenant).await?;
    let before = user.clone();
    user.reactivate(now)?;
    organisation.ensure_seat_available()?;
    let organisation = commit_with_seats(
        &services,
        organisation,
        Some(&before),
        &user,
        principal.principal_id(),
        "user.reactivate",
        now,
    )
    .await?;

    tracing::info!(tenant_id = %tenant.tenant_id(), user_id = %user.id, "user reactivated");
    Ok(dto::ok(serde_json::json!({
        "user": UserView::from(&user),
        "seats_used": organisation.seats_used,
    })))
}
