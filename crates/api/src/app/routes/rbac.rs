//! RBAC audit endpoints for authorization debugging.
//!
//! They answer "why was this request denied?" by showing the default role
//! policy and explaining individual decisions.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    routing::get,
};
use serde::Deserialize;

use caretrack_auth::permissions::USERS_READ;
use caretrack_auth::{Permission, Principal, RbacRegistry, User, explain_authorization};
use caretrack_core::{DomainError, UserId};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::{self, authorize_request};
use crate::context::{PrincipalContext, TenantContext};

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
    pub user_id: Option<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles))
        .route("/roles/:name", get(get_role))
        .route("/permissions", get(list_permissions))
        .route("/explain", get(explain))
}

/// GET /admin/rbac/roles - every role and the permissions it grants
pub async fn list_roles(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_READ)?;
    Ok(dto::items(RbacRegistry::from_default_policy().roles))
}

/// GET /admin/rbac/roles/:name
pub async fn get_role(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_READ)?;
    let registry = RbacRegistry::from_default_policy();
    let role = registry
        .role(&name)
        .cloned()
        .ok_or(DomainError::not_found("role"))?;
    Ok(dto::ok(role))
}

/// GET /admin/rbac/permissions - permission name → roles granting it
pub async fn list_permissions(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &USERS_READ)?;
    Ok(dto::ok(serde_json::json!({
        "permissions": RbacRegistry::from_default_policy().permissions,
    })))
}

/// GET /admin/rbac/explain?permission=X[&user_id=Y]
///
/// Anyone may explain their own access; explaining another user's access
/// needs `users.read`.
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ExplainQuery>,
) -> ApiResult<axum::response::Response> {
    let required = Permission::new(query.permission.trim().to_string());

    let subject = match query.user_id.as_deref() {
        None => authz::principal(&tenant, &principal),
        Some(raw) => {
            authorize_request(&tenant, &principal, &USERS_READ)?;
            let user_id: UserId = dto::parse_id(raw)?;
            let user = services.require::<User>(tenant.tenant_id(), user_id, "user").await?;
            Principal::from_roles(user.id, tenant.tenant_id(), &[user.role])
        }
    };

    Ok(dto::ok(serde_json::json!({
        "user_id": subject.principal_id,
        "explanation": explain_authorization(&subject, &required),
    })))
}
