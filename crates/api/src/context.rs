use caretrack_auth::Role;
use caretrack_core::{TenantId, UserId};

/// Tenant context for a request.
///
/// Taken from the verified token; every tenant-scoped read and write uses it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Principal context for a request (authenticated user + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: UserId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: UserId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    pub fn principal_id(&self) -> UserId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn max_rank(&self) -> u8 {
        self.roles.iter().map(Role::rank).max().unwrap_or(0)
    }
}
