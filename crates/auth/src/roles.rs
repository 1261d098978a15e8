use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Roles travel as opaque strings (tokens, stored users); the well-known set
/// below is what the default policy understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

pub const SUPERADMIN: Role = Role::from_static("superadmin");
pub const ORGANISATION_ADMIN: Role = Role::from_static("organisation_admin");
pub const CONTRACT_MANAGER: Role = Role::from_static("contract_manager");
pub const FINANCE: Role = Role::from_static("finance");
pub const STAFF: Role = Role::from_static("staff");
pub const VIEWER: Role = Role::from_static("viewer");

/// Every role the default policy knows, most privileged first.
pub const KNOWN_ROLES: [Role; 6] = [SUPERADMIN, ORGANISATION_ADMIN, CONTRACT_MANAGER, FINANCE, STAFF, VIEWER];

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a role name, accepting only the well-known roles.
    pub fn parse_known(name: &str) -> Option<Role> {
        let name = name.trim().to_ascii_lowercase();
        KNOWN_ROLES.into_iter().find(|r| r.as_str() == name)
    }

    /// Privilege rank used to stop users granting more than they hold.
    ///
    /// Unknown roles rank lowest.
    pub fn rank(&self) -> u8 {
        match self.as_str() {
            "superadmin" => 5,
            "organisation_admin" => 4,
            "contract_manager" => 3,
            "finance" => 2,
            "staff" => 1,
            _ => 0,
        }
    }

    pub fn description(&self) -> Option<&'static str> {
        match self.as_str() {
            "superadmin" => Some("Platform operator; approves seat changes across organisations"),
            "organisation_admin" => Some("Administers users, teams and settings of one organisation"),
            "contract_manager" => Some("Manages contracts, rates, people and tenders"),
            "finance" => Some("Records payments and maintains rates"),
            "staff" => Some("Day-to-day updates to people and contracts"),
            "viewer" => Some("Read-only access"),
            _ => None,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_is_case_insensitive() {
        assert_eq!(Role::parse_known(" Finance "), Some(FINANCE));
        assert_eq!(Role::parse_known("root"), None);
    }

    #[test]
    fn ranks_follow_privilege_order() {
        let ranks: Vec<u8> = KNOWN_ROLES.iter().map(Role::rank).collect();
        let mut sorted = ranks.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(ranks, sorted);
        assert_eq!(Role::new("custom").rank(), 0);
    }
}
