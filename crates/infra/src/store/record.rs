use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use caretrack_approvals::{ApprovalRequest, ApprovalRule};
use caretrack_assistant::GlossaryTerm;
use caretrack_auth::User;
use caretrack_contracts::{Contract, ContractType, LocalAuthority, Payment, Rate};
use caretrack_core::{Entity, TenantId};
use caretrack_organisations::{Organisation, SeatChangeRequest};
use caretrack_people::Person;
use caretrack_teams::{Team, TeamMember};
use caretrack_tenders::{TenderApplication, TenderMonitoringPreference, TenderOpportunity};

use crate::audit::AuditEntry;

/// A persisted record type, stored as a JSON document in [`Record::TABLE`].
pub trait Record: Entity + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn tenant_id(&self) -> TenantId;

    /// Soft-deleted rows stay stored but drop out of `list_active`.
    fn is_active(&self) -> bool {
        true
    }

    fn uuid(&self) -> Uuid {
        (*self.id()).into()
    }
}

/// Every document table; the migrations create exactly these.
pub const TABLES: &[&str] = &[
    Organisation::TABLE,
    SeatChangeRequest::TABLE,
    User::TABLE,
    ContractType::TABLE,
    LocalAuthority::TABLE,
    Contract::TABLE,
    Rate::TABLE,
    Payment::TABLE,
    Person::TABLE,
    Team::TABLE,
    TeamMember::TABLE,
    TenderApplication::TABLE,
    TenderMonitoringPreference::TABLE,
    TenderOpportunity::TABLE,
    ApprovalRule::TABLE,
    ApprovalRequest::TABLE,
    GlossaryTerm::TABLE,
    AuditEntry::TABLE,
];

macro_rules! record {
    ($ty:ty, $table:literal) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;

            fn tenant_id(&self) -> TenantId {
                self.tenant_id
            }
        }
    };
    ($ty:ty, $table:literal, active) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;

            fn tenant_id(&self) -> TenantId {
                self.tenant_id
            }

            fn is_active(&self) -> bool {
                self.is_active
            }
        }
    };
}

impl Record for Organisation {
    const TABLE: &'static str = "organisations";

    fn tenant_id(&self) -> TenantId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

record!(SeatChangeRequest, "seat_change_requests");
record!(User, "users", active);
record!(ContractType, "contract_types", active);
record!(LocalAuthority, "local_authorities", active);
record!(Contract, "contracts", active);
record!(Rate, "rates");
record!(Payment, "payments", active);
record!(Person, "people", active);
record!(Team, "teams", active);
record!(TeamMember, "team_members", active);
record!(TenderApplication, "tender_applications");
record!(TenderMonitoringPreference, "tender_preferences", active);
record!(TenderOpportunity, "tender_opportunities", active);
record!(ApprovalRule, "approval_rules", active);
record!(ApprovalRequest, "approval_requests");
record!(GlossaryTerm, "glossary_terms");
record!(AuditEntry, "audit_log");
