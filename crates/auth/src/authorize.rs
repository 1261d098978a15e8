use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use caretrack_core::{TenantId, UserId};

use crate::{Permission, Role, default_role_permissions, roles::KNOWN_ROLES};

/// A principal's membership in a tenant: which organisation it acts within
/// and what it was granted there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: UserId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

impl Principal {
    /// Resolve a principal through the default role policy.
    pub fn from_roles(principal_id: UserId, tenant_id: TenantId, roles: &[Role]) -> Self {
        let mut permissions: Vec<Permission> = roles
            .iter()
            .flat_map(|r| default_role_permissions(r.as_str()))
            .collect();
        permissions.sort();
        permissions.dedup();

        Self {
            principal_id,
            active_tenant_id: tenant_id,
            membership: TenantMembership {
                tenant_id,
                roles: roles.to_vec(),
                permissions,
            },
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.membership.roles.contains(role)
    }

    /// Highest privilege rank among the principal's roles.
    pub fn max_rank(&self) -> u8 {
        self.membership.roles.iter().map(Role::rank).max().unwrap_or(0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal within its active tenant context.
///
/// Pure policy check: no IO, no business logic.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let granted = principal
        .membership
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization explanation (audit/debug)
// ─────────────────────────────────────────────────────────────────────────────

/// Why a request was (or would be) allowed or denied.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub roles: Vec<String>,
    pub effective_permissions: Vec<String>,
    /// Known roles that would grant the permission, for denied decisions.
    pub granting_roles: Vec<String>,
}

/// Explain an authorization decision against the default role policy.
pub fn explain_authorization(principal: &Principal, required: &Permission) -> AuthorizationExplanation {
    let roles: Vec<String> = principal.membership.roles.iter().map(|r| r.to_string()).collect();
    let effective: BTreeSet<String> = principal
        .membership
        .permissions
        .iter()
        .map(|p| p.to_string())
        .collect();
    let effective_permissions: Vec<String> = effective.iter().cloned().collect();

    let (granted, reason) = match authorize(principal, required) {
        Ok(()) if effective.contains("*") => (true, "principal holds the wildcard permission".to_string()),
        Ok(()) => (true, format!("principal holds '{required}'")),
        Err(AuthzError::TenantMismatch) => (
            false,
            format!(
                "principal is active in tenant {} but its membership is for tenant {}",
                principal.active_tenant_id, principal.membership.tenant_id
            ),
        ),
        Err(AuthzError::Forbidden(_)) => (false, format!("missing required permission '{required}'")),
    };

    let granting_roles = if granted {
        Vec::new()
    } else {
        KNOWN_ROLES
            .iter()
            .filter(|r| {
                default_role_permissions(r.as_str())
                    .iter()
                    .any(|p| p.is_wildcard() || p == required)
            })
            .map(|r| r.to_string())
            .collect()
    };

    AuthorizationExplanation {
        required_permission: required.to_string(),
        granted,
        reason,
        roles,
        effective_permissions,
        granting_roles,
    }
}

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: String,
    pub rank: u8,
    pub permissions: Vec<String>,
    pub description: Option<String>,
}

/// Complete view of the default RBAC policy.
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: Vec<RoleDefinition>,
    /// Permission name → roles granting it explicitly.
    pub permissions: BTreeMap<String, Vec<String>>,
}

impl RbacRegistry {
    pub fn from_default_policy() -> Self {
        let mut permissions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let roles = KNOWN_ROLES
            .iter()
            .map(|role| {
                let perms: Vec<String> = default_role_permissions(role.as_str())
                    .into_iter()
                    .map(|p| p.to_string())
                    .collect();
                for p in &perms {
                    permissions.entry(p.clone()).or_default().push(role.to_string());
                }
                RoleDefinition {
                    name: role.to_string(),
                    rank: role.rank(),
                    permissions: perms,
                    description: role.description().map(str::to_string),
                }
            })
            .collect();

        Self { roles, permissions }
    }

    pub fn role(&self, name: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{AUDIT_READ, CONTRACTS_WRITE, PAYMENTS_WRITE, SEATS_APPROVE};
    use crate::roles::{FINANCE, STAFF, SUPERADMIN, VIEWER};

    #[test]
    fn staff_can_write_contracts_but_not_payments() {
        let p = Principal::from_roles(UserId::new(), TenantId::new(), &[STAFF]);
        assert!(authorize(&p, &CONTRACTS_WRITE).is_ok());
        assert_eq!(
            authorize(&p, &PAYMENTS_WRITE),
            Err(AuthzError::Forbidden("payments.write".to_string()))
        );
    }

    #[test]
    fn roles_combine() {
        let p = Principal::from_roles(UserId::new(), TenantId::new(), &[STAFF, FINANCE]);
        assert!(authorize(&p, &PAYMENTS_WRITE).is_ok());
        assert!(authorize(&p, &CONTRACTS_WRITE).is_ok());
        assert_eq!(p.max_rank(), FINANCE.rank());
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = Principal::from_roles(UserId::new(), TenantId::new(), &[SUPERADMIN]);
        assert!(authorize(&p, &SEATS_APPROVE).is_ok());
    }

    #[test]
    fn tenant_mismatch_is_rejected_even_with_wildcard() {
        let mut p = Principal::from_roles(UserId::new(), TenantId::new(), &[SUPERADMIN]);
        p.active_tenant_id = TenantId::new();
        assert_eq!(authorize(&p, &AUDIT_READ), Err(AuthzError::TenantMismatch));
    }

    #[test]
    fn explanation_lists_granting_roles_on_denial() {
        let p = Principal::from_roles(UserId::new(), TenantId::new(), &[VIEWER]);
        let e = explain_authorization(&p, &PAYMENTS_WRITE);
        assert!(!e.granted);
        assert!(e.granting_roles.contains(&"finance".to_string()));
        assert!(e.granting_roles.contains(&"superadmin".to_string()));
        assert!(!e.granting_roles.contains(&"staff".to_string()));
    }

    #[test]
    fn registry_covers_known_roles() {
        let registry = RbacRegistry::from_default_policy();
        assert_eq!(registry.roles.len(), KNOWN_ROLES.len());
        assert!(registry.role("finance").is_some());
        assert_eq!(registry.permissions["payments.write"], vec!["organisation_admin", "finance"]);
    }
}
