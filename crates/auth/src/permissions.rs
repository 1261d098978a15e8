use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings of the form `area.action`
/// (e.g. `"contracts.write"`). The wildcard `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// The area prefix (`"contracts"` for `"contracts.write"`).
    pub fn area(&self) -> &str {
        self.as_str().split('.').next().unwrap_or_default()
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ALL: Permission = Permission::from_static("*");

pub const ORGANISATION_READ: Permission = Permission::from_static("organisations.read");
pub const SEATS_REQUEST: Permission = Permission::from_static("seats.request");
pub const SEATS_APPROVE: Permission = Permission::from_static("seats.approve");

pub const USERS_READ: Permission = Permission::from_static("users.read");
pub const USERS_WRITE: Permission = Permission::from_static("users.write");

pub const CONTRACTS_READ: Permission = Permission::from_static("contracts.read");
pub const CONTRACTS_WRITE: Permission = Permission::from_static("contracts.write");
pub const REFERENCE_WRITE: Permission = Permission::from_static("reference.write");

pub const RATES_READ: Permission = Permission::from_static("rates.read");
pub const RATES_WRITE: Permission = Permission::from_static("rates.write");

pub const PEOPLE_READ: Permission = Permission::from_static("people.read");
pub const PEOPLE_WRITE: Permission = Permission::from_static("people.write");

pub const PAYMENTS_READ: Permission = Permission::from_static("payments.read");
pub const PAYMENTS_WRITE: Permission = Permission::from_static("payments.write");

pub const TENDERS_READ: Permission = Permission::from_static("tenders.read");
pub const TENDERS_WRITE: Permission = Permission::from_static("tenders.write");

pub const TEAMS_READ: Permission = Permission::from_static("teams.read");
pub const TEAMS_WRITE: Permission = Permission::from_static("teams.write");

pub const APPROVALS_READ: Permission = Permission::from_static("approvals.read");
pub const APPROVALS_DECIDE: Permission = Permission::from_static("approvals.decide");
pub const APPROVALS_CONFIGURE: Permission = Permission::from_static("approvals.configure");

pub const AUDIT_READ: Permission = Permission::from_static("audit.read");
pub const GLOSSARY_WRITE: Permission = Permission::from_static("glossary.write");
pub const ASSISTANT_USE: Permission = Permission::from_static("assistant.use");

const READ_ONLY: &[Permission] = &[
    ORGANISATION_READ,
    CONTRACTS_READ,
    RATES_READ,
    PEOPLE_READ,
    PAYMENTS_READ,
    TENDERS_READ,
    TEAMS_READ,
    APPROVALS_READ,
    ASSISTANT_USE,
];

/// Default role-to-permission mapping.
///
/// `superadmin` is the only role holding the wildcard; organisation admins get
/// every tenant permission explicitly but cannot approve seat changes.
pub fn default_role_permissions(role: &str) -> Vec<Permission> {
    let mut perms: Vec<Permission> = match role {
        "superadmin" => return vec![ALL],
        "organisation_admin" => vec![
            SEATS_REQUEST,
            USERS_READ,
            USERS_WRITE,
            CONTRACTS_WRITE,
            REFERENCE_WRITE,
            RATES_WRITE,
            PEOPLE_WRITE,
            PAYMENTS_WRITE,
            TENDERS_WRITE,
            TEAMS_WRITE,
            APPROVALS_DECIDE,
            APPROVALS_CONFIGURE,
            AUDIT_READ,
            GLOSSARY_WRITE,
        ],
        "contract_manager" => vec![
            USERS_READ,
            CONTRACTS_WRITE,
            REFERENCE_WRITE,
            RATES_WRITE,
            PEOPLE_WRITE,
            TENDERS_WRITE,
            APPROVALS_DECIDE,
            AUDIT_READ,
            GLOSSARY_WRITE,
        ],
        "finance" => vec![RATES_WRITE, PAYMENTS_WRITE, AUDIT_READ],
        "staff" => vec![PEOPLE_WRITE, CONTRACTS_WRITE],
        "viewer" => Vec::new(),
        _ => return Vec::new(),
    };
    perms.extend_from_slice(READ_ONLY);
    perms.sort();
    perms.dedup();
    perms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_superadmin_holds_wildcard() {
        assert_eq!(default_role_permissions("superadmin"), vec![ALL]);
        for role in ["organisation_admin", "contract_manager", "finance", "staff", "viewer"] {
            assert!(!default_role_permissions(role).iter().any(Permission::is_wildcard));
        }
    }

    #[test]
    fn organisation_admin_cannot_approve_seats() {
        let perms = default_role_permissions("organisation_admin");
        assert!(perms.contains(&SEATS_REQUEST));
        assert!(!perms.contains(&SEATS_APPROVE));
    }

    #[test]
    fn viewer_is_read_only() {
        let perms = default_role_permissions("viewer");
        assert!(perms.contains(&CONTRACTS_READ));
        assert!(perms.iter().all(|p| !p.as_str().ends_with(".write")));
    }

    #[test]
    fn unknown_roles_get_nothing() {
        assert!(default_role_permissions("intruder").is_empty());
    }

    #[test]
    fn area_is_prefix() {
        assert_eq!(CONTRACTS_WRITE.area(), "contracts");
        assert_eq!(ALL.area(), "*");
    }
}
