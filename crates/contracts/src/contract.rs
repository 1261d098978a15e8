use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{
    ContractId, ContractTypeId, DomainError, DomainResult, Entity, LocalAuthorityId, Money,
    PersonId, TeamId, TenantId, optional_text, required_text,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Active,
    OnHold,
    Expired,
    Terminated,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 5] = [
        ContractStatus::Draft,
        ContractStatus::Active,
        ContractStatus::OnHold,
        ContractStatus::Expired,
        ContractStatus::Terminated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Active => "active",
            ContractStatus::OnHold => "on_hold",
            ContractStatus::Expired => "expired",
            ContractStatus::Terminated => "terminated",
        }
    }

    pub fn parse(s: &str) -> Option<ContractStatus> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    pub fn can_transition_to(self, next: ContractStatus) -> bool {
        use ContractStatus::*;
        matches!(
            (self, next),
            (Draft, Active)
                | (Draft, Terminated)
                | (Active, OnHold)
                | (Active, Expired)
                | (Active, Terminated)
                | (OnHold, Active)
                | (OnHold, Expired)
                | (OnHold, Terminated)
                | (Expired, Active)
        )
    }

    /// Statuses that count towards the live portfolio.
    pub fn is_live(self) -> bool {
        matches!(self, ContractStatus::Active | ContractStatus::OnHold)
    }
}

/// Submitted contract fields, used for both create and full update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDraft {
    pub title: String,
    pub reference: String,
    pub contract_type_id: ContractTypeId,
    pub local_authority_id: LocalAuthorityId,
    pub person_id: Option<PersonId>,
    pub team_id: Option<TeamId>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub annual_value: Option<Money>,
    pub status: Option<ContractStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub tenant_id: TenantId,
    pub title: String,
    pub reference: String,
    pub contract_type_id: ContractTypeId,
    pub local_authority_id: LocalAuthorityId,
    pub person_id: Option<PersonId>,
    pub team_id: Option<TeamId>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub annual_value: Option<Money>,
    pub status: ContractStatus,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Contract {
    type Id = ContractId;

    fn id(&self) -> &ContractId {
        &self.id
    }
}

fn validate_dates(start: NaiveDate, end: Option<NaiveDate>) -> DomainResult<()> {
    match end {
        Some(end) if end < start => Err(DomainError::validation("end date is before start date")),
        _ => Ok(()),
    }
}

impl Contract {
    pub fn create(tenant_id: TenantId, draft: ContractDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_dates(draft.start_date, draft.end_date)?;
        let status = draft.status.unwrap_or(ContractStatus::Draft);
        if !matches!(status, ContractStatus::Draft | ContractStatus::Active) {
            return Err(DomainError::validation("new contracts start as draft or active"));
        }

        Ok(Self {
            id: ContractId::new(),
            tenant_id,
            title: required_text("title", &draft.title)?,
            reference: required_text("reference", &draft.reference)?.to_uppercase(),
            contract_type_id: draft.contract_type_id,
            local_authority_id: draft.local_authority_id,
            person_id: draft.person_id,
            team_id: draft.team_id,
            start_date: draft.start_date,
            end_date: draft.end_date,
            annual_value: draft.annual_value,
            status,
            notes: optional_text(draft.notes),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a full update. Returns a copy so callers can diff, audit or park
    /// it for approval before persisting.
    pub fn updated(&self, draft: ContractDraft, now: DateTime<Utc>) -> DomainResult<Contract> {
        if !self.is_active {
            return Err(DomainError::invariant("contract has been deleted"));
        }
        validate_dates(draft.start_date, draft.end_date)?;

        let status = match draft.status {
            Some(next) if next != self.status => {
                if !self.status.can_transition_to(next) {
                    return Err(DomainError::invariant(format!(
                        "contract cannot move from {} to {}",
                        self.status.as_str(),
                        next.as_str()
                    )));
                }
                next
            }
            _ => self.status,
        };

        Ok(Contract {
            title: required_text("title", &draft.title)?,
            reference: required_text("reference", &draft.reference)?.to_uppercase(),
            contract_type_id: draft.contract_type_id,
            local_authority_id: draft.local_authority_id,
            person_id: draft.person_id,
            team_id: draft.team_id,
            start_date: draft.start_date,
            end_date: draft.end_date,
            annual_value: draft.annual_value,
            status,
            notes: optional_text(draft.notes),
            updated_at: now,
            ..self.clone()
        })
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::invariant("contract has already been deleted"));
        }
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    /// Names of the fields that differ between `self` and `other`.
    pub fn changed_fields(&self, other: &Contract) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let mut check = |name: &'static str, differs: bool| {
            if differs {
                fields.push(name);
            }
        };
        check("title", self.title != other.title);
        check("reference", self.reference != other.reference);
        check("contract_type_id", self.contract_type_id != other.contract_type_id);
        check("local_authority_id", self.local_authority_id != other.local_authority_id);
        check("person_id", self.person_id != other.person_id);
        check("team_id", self.team_id != other.team_id);
        check("start_date", self.start_date != other.start_date);
        check("end_date", self.end_date != other.end_date);
        check("annual_value", self.annual_value != other.annual_value);
        check("status", self.status != other.status);
        check("notes", self.notes != other.notes);
        fields
    }

    /// Live contract whose end date falls within `days` of `today`.
    ///
    /// A window reaching past the last representable date covers every
    /// future end date; a negative window matches nothing.
    pub fn is_expiring_within(&self, days: i64, today: NaiveDate) -> bool {
        let Ok(days) = u64::try_from(days) else {
            return false;
        };
        let horizon = today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
        match self.end_date {
            Some(end) if self.is_active && self.status.is_live() => end >= today && end <= horizon,
            _ => false,
        }
    }
}

/// Reject a reference already used by another active contract.
pub fn ensure_unique_reference<'a>(
    existing: impl IntoIterator<Item = &'a Contract>,
    reference: &str,
    except: Option<ContractId>,
) -> DomainResult<()> {
    let wanted = reference.trim().to_uppercase();
    let clash = existing
        .into_iter()
        .any(|c| c.is_active && c.reference == wanted && Some(c.id) != except);
    if clash {
        return Err(DomainError::conflict(format!("contract reference '{wanted}' is already in use")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft() -> ContractDraft {
        ContractDraft {
            title: "Home care North".into(),
            reference: "hc-001".into(),
            contract_type_id: ContractTypeId::new(),
            local_authority_id: LocalAuthorityId::new(),
            person_id: None,
            team_id: None,
            start_date: date(2025, 4, 1),
            end_date: Some(date(2026, 3, 31)),
            annual_value: Some(Money::from_minor(12_000_000).unwrap()),
            status: Some(ContractStatus::Active),
            notes: Some("  ".into()),
        }
    }

    #[test]
    fn create_normalizes_fields() {
        let c = Contract::create(TenantId::new(), draft(), Utc::now()).unwrap();
        assert_eq!(c.reference, "HC-001");
        assert_eq!(c.notes, None);
        assert_eq!(c.status, ContractStatus::Active);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut d = draft();
        d.end_date = Some(date(2025, 3, 1));
        assert!(Contract::create(TenantId::new(), d, Utc::now()).is_err());
    }

    #[test]
    fn new_contracts_cannot_start_terminated() {
        let mut d = draft();
        d.status = Some(ContractStatus::Terminated);
        assert!(Contract::create(TenantId::new(), d, Utc::now()).is_err());
    }

    #[test]
    fn update_enforces_status_workflow_and_reports_changes() {
        let c = Contract::create(TenantId::new(), draft(), Utc::now()).unwrap();

        let mut d = draft();
        d.status = Some(ContractStatus::Draft);
        assert!(matches!(c.updated(d, Utc::now()), Err(DomainError::InvariantViolation(_))));

        let mut d = draft();
        d.status = Some(ContractStatus::OnHold);
        d.annual_value = Some(Money::from_minor(13_000_000).unwrap());
        let next = c.updated(d, Utc::now()).unwrap();
        assert_eq!(c.changed_fields(&next), vec!["annual_value", "status"]);
        assert_eq!(next.id, c.id);
        assert_eq!(next.created_at, c.created_at);
    }

    #[test]
    fn terminated_is_final() {
        for next in ContractStatus::ALL {
            assert!(!ContractStatus::Terminated.can_transition_to(next));
        }
    }

    #[test]
    fn expiring_window() {
        let c = Contract::create(TenantId::new(), draft(), Utc::now()).unwrap();
        assert!(c.is_expiring_within(30, date(2026, 3, 15)));
        assert!(!c.is_expiring_within(30, date(2026, 1, 1)));
        assert!(!c.is_expiring_within(30, date(2026, 4, 2)));
    }

    #[test]
    fn expiring_window_survives_extreme_day_counts() {
        let c = Contract::create(TenantId::new(), draft(), Utc::now()).unwrap();
        assert!(c.is_expiring_within(1_000_000_000, date(2026, 1, 1)));
        assert!(c.is_expiring_within(i64::MAX, date(2026, 1, 1)));
        assert!(!c.is_expiring_within(-1, date(2026, 3, 31)));
        assert!(!c.is_expiring_within(i64::MIN, date(2026, 3, 31)));
        assert!(c.is_expiring_within(0, date(2026, 3, 31)));
    }

    #[test]
    fn a_contract_needs_a_type_and_an_authority() {
        let mut body = serde_json::to_value(draft()).unwrap();
        body.as_object_mut().unwrap().remove("local_authority_id");
        assert!(serde_json::from_value::<ContractDraft>(body).is_err());
    }

    #[test]
    fn references_are_unique_among_active_contracts() {
        let mut a = Contract::create(TenantId::new(), draft(), Utc::now()).unwrap();
        assert!(ensure_unique_reference([&a], " hc-001", None).is_err());
        assert!(ensure_unique_reference([&a], "HC-001", Some(a.id)).is_ok());
        a.soft_delete(Utc::now()).unwrap();
        assert!(ensure_unique_reference([&a], "HC-001", None).is_ok());
    }
}
