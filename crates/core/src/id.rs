//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered), so ids sort by creation time.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s.trim())
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_id!(
    /// Identifier of an organisation (the multi-tenant boundary).
    TenantId,
    "TenantId"
);
uuid_id!(
    /// Identifier of a user account.
    UserId,
    "UserId"
);
uuid_id!(ContractId, "ContractId");
uuid_id!(ContractTypeId, "ContractTypeId");
uuid_id!(LocalAuthorityId, "LocalAuthorityId");
uuid_id!(RateId, "RateId");
uuid_id!(PaymentId, "PaymentId");
uuid_id!(PersonId, "PersonId");
uuid_id!(TeamId, "TeamId");
uuid_id!(TeamMemberId, "TeamMemberId");
uuid_id!(TenderId, "TenderId");
uuid_id!(PreferenceId, "PreferenceId");
uuid_id!(OpportunityId, "OpportunityId");
uuid_id!(ApprovalRuleId, "ApprovalRuleId");
uuid_id!(ApprovalRequestId, "ApprovalRequestId");
uuid_id!(SeatChangeRequestId, "SeatChangeRequestId");
uuid_id!(GlossaryTermId, "GlossaryTermId");
uuid_id!(AuditEntryId, "AuditEntryId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        let id = ContractId::new();
        let parsed: ContractId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_failure_names_the_id_type() {
        let err = "not-a-uuid".parse::<PersonId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("PersonId")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
