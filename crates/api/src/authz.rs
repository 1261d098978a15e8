//! API-side authorization guard.
//!
//! Handlers call [`authorize_request`] before touching the store, which keeps
//! the domain crates and infra auth-agnostic.

use caretrack_auth::{AuthzError, Permission, Principal, authorize};

use crate::context::{PrincipalContext, TenantContext};

/// Resolve the request principal through the default role policy.
pub fn principal(tenant: &TenantContext, principal: &PrincipalContext) -> Principal {
    Principal::from_roles(principal.principal_id(), tenant.tenant_id(), principal.roles())
}

/// Check one permission in the current request context.
pub fn authorize_request(
    tenant: &TenantContext,
    principal_ctx: &PrincipalContext,
    required: &Permission,
) -> Result<(), AuthzError> {
    authorize(&principal(tenant, principal_ctx), required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caretrack_auth::permissions::{CONTRACTS_READ, CONTRACTS_WRITE, SEATS_APPROVE};
    use caretrack_auth::roles::{ORGANISATION_ADMIN, SUPERADMIN, VIEWER};
    use caretrack_core::{TenantId, UserId};

    fn ctx(roles: Vec<caretrack_auth::Role>) -> (TenantContext, PrincipalContext) {
        (TenantContext::new(TenantId::new()), PrincipalContext::new(UserId::new(), roles))
    }

    #[test]
    fn viewer_reads_but_cannot_write() {
        let (tenant, principal) = ctx(vec![VIEWER]);
        assert!(authorize_request(&tenant, &principal, &CONTRACTS_READ).is_ok());
        assert_eq!(
            authorize_request(&tenant, &principal, &CONTRACTS_WRITE),
            Err(AuthzError::Forbidden("contracts.write".to_string()))
        );
    }

    #[test]
    fn only_superadmin_approves_seats() {
        let (tenant, admin) = ctx(vec![ORGANISATION_ADMIN]);
        assert!(authorize_request(&tenant, &admin, &SEATS_APPROVE).is_err());

        let (tenant, root) = ctx(vec![SUPERADMIN]);
        assert!(authorize_request(&tenant, &root, &SEATS_APPROVE).is_ok());
    }
}
