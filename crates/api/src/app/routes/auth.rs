//! Public authentication endpoints: sign-up, sign-in, email verification.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;

use caretrack_auth::roles::{ORGANISATION_ADMIN, SUPERADMIN};
use caretrack_auth::{User, hash_password, normalize_email, verify_password, verify_unknown_account};
use caretrack_core::DomainError;
use caretrack_infra::{Email, WriteBatch};
use caretrack_organisations::Organisation;

use crate::app::dto::{self, UserView};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::{AppServices, audit};

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify", get(verify))
}

/// Emails are unique across every organisation: sign-in looks users up by
/// email alone.
pub(crate) async fn ensure_email_available(services: &AppServices, email: &str) -> ApiResult<()> {
    let taken = services
        .records::<User>()
        .list_all()
        .await?
        .iter()
        .any(|u| u.email == email);
    if taken {
        return Err(DomainError::conflict(format!("email '{email}' is already registered")).into());
    }
    Ok(())
}

/// Send the verification link for `user`, if it still has a pending token.
pub(crate) async fn send_verification(services: &AppServices, user: &User) -> bool {
    match &user.verification_token {
        Some(token) => {
            let email = Email::verification(&user.email, &user.display_name, services.public_base_url(), token);
            services.send_mail(email).await
        }
        None => false,
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthenticated("invalid email or password".to_string())
}

/// POST /auth/register - create an organisation and its first administrator
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> ApiResult<axum::response::Response> {
    let now = Utc::now();
    let email = normalize_email(&body.email)?;
    ensure_email_available(&services, &email).await?;
    let password_hash = hash_password(&body.password)?;

    let role = if services.is_superadmin_email(&email) {
        SUPERADMIN
    } else {
        ORGANISATION_ADMIN
    };

    let mut organisation = Organisation::new(&body.organisation_name, now)?;
    organisation.ensure_seat_available()?;
    let user = User::register(organisation.id, &email, &body.display_name, role, password_hash, now)?;
    organisation.recompute_seats(1, now);

    let mut batch = WriteBatch::new();
    batch.put(&organisation)?.put(&user)?;
    audit(
        &mut batch,
        organisation.id,
        Some(user.id),
        "organisation.register",
        "organisation",
        organisation.id,
        None,
        Some(&organisation),
        now,
    )?;
    audit(&mut batch, organisation.id, Some(user.id), "user.create", "user", user.id, None, Some(&user), now)?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %organisation.id, user_id = %user.id, "organisation registered");
    let verification_email_sent = send_verification(&services, &user).await;

    Ok(dto::created(json!({
        "organisation": organisation,
        "user": UserView::from(&user),
        "verification_email_sent": verification_email_sent,
    })))
}

/// POST /auth/login - exchange credentials for a bearer token
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> ApiResult<axum::response::Response> {
    let email = normalize_email(&body.email).ok();
    let found = match &email {
        Some(email) => services
            .records::<User>()
            .list_all()
            .await?
            .into_iter()
            .find(|u| &u.email == email),
        None => None,
    };
    let Some(mut user) = found else {
        verify_unknown_account(&body.password);
        return Err(invalid_credentials());
    };

    if !verify_password(&body.password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "sign-in rejected: wrong password");
        return Err(invalid_credentials());
    }
    if !user.can_sign_in() {
        return Err(ApiError::Unauthenticated("this account has been deactivated".to_string()));
    }
    let organisation = services
        .records::<Organisation>()
        .get(user.tenant_id, user.tenant_id)
        .await?;
    if !organisation.is_some_and(|o| o.is_active) {
        return Err(ApiError::Unauthenticated("this organisation is not active".to_string()));
    }
    if services.is_superadmin_email(&user.email) && user.role != SUPERADMIN {
        promote_to_superadmin(&services, &mut user).await?;
    }

    let (token, claims) = services.issue_token(user.id, user.tenant_id, vec![user.role.clone()], Utc::now())?;
    tracing::info!(tenant_id = %user.tenant_id, user_id = %user.id, "signed in");

    Ok(dto::ok(json!({
        "token": token,
        "token_type": "Bearer",
        "expires_at": claims.expires_at,
        "user": UserView::from(&user),
    })))
}

/// Accounts listed in `SUPERADMIN_EMAILS` that predate the setting pick up
/// the role on their next sign-in.
async fn promote_to_superadmin(services: &AppServices, user: &mut User) -> ApiResult<()> {
    let now = Utc::now();
    let before = user.clone();
    user.change_role(SUPERADMIN, SUPERADMIN.rank(), now)?;

    let mut batch = WriteBatch::new();
    batch.put(&*user)?;
    audit(
        &mut batch,
        user.tenant_id,
        None,
        "user.promote_superadmin",
        "user",
        user.id,
        Some(&before),
        Some(&*user),
        now,
    )?;
    services.commit(batch).await?;

    tracing::warn!(tenant_id = %user.tenant_id, user_id = %user.id, "user promoted to superadmin from configuration");
    Ok(())
}

/// GET /auth/verify?token= - confirm an email address
pub async fn verify(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::VerifyQuery>,
) -> ApiResult<axum::response::Response> {
    let now = Utc::now();
    let token = query.token.trim();
    let mut user = services
        .records::<User>()
        .list_all()
        .await?
        .into_iter()
        .find(|u| !token.is_empty() && u.verification_token.as_deref() == Some(token))
        .ok_or_else(|| DomainError::validation("verification token is invalid or already used"))?;

    let before = user.clone();
    user.verify_email(token, now)?;

    let mut batch = WriteBatch::new();
    batch.put(&user)?;
    audit(
        &mut batch,
        user.tenant_id,
        Some(user.id),
        "user.verify_email",
        "user",
        user.id,
        Some(&before),
        Some(&user),
        now,
    )?;
    services.commit(batch).await?;

    tracing::info!(tenant_id = %user.tenant_id, user_id = %user.id, "email verified");
    Ok(dto::ok(json!({ "verified": true, "email": user.email })))
}
