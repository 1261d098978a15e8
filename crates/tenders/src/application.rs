use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{
    DomainError, DomainResult, Entity, Money, OpportunityId, TenantId, TenderId, optional_text,
    required_text,
};

/// Status workflow of a tender application.
///
/// ```text
/// identified -> drafting -> submitted -> shortlisted -> won | lost
///                              \-------------------------> won | lost
/// any open status -> withdrawn
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    Identified,
    Drafting,
    Submitted,
    Shortlisted,
    Won,
    Lost,
    Withdrawn,
}

impl TenderStatus {
    pub const ALL: [TenderStatus; 7] = [
        TenderStatus::Identified,
        TenderStatus::Drafting,
        TenderStatus::Submitted,
        TenderStatus::Shortlisted,
        TenderStatus::Won,
        TenderStatus::Lost,
        TenderStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TenderStatus::Identified => "identified",
            TenderStatus::Drafting => "drafting",
            TenderStatus::Submitted => "submitted",
            TenderStatus::Shortlisted => "shortlisted",
            TenderStatus::Won => "won",
            TenderStatus::Lost => "lost",
            TenderStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn is_open(self) -> bool {
        !matches!(self, TenderStatus::Won | TenderStatus::Lost | TenderStatus::Withdrawn)
    }

    pub fn can_transition_to(self, next: TenderStatus) -> bool {
        use TenderStatus::*;
        match (self, next) {
            (Identified, Drafting) | (Drafting, Submitted) | (Submitted, Shortlisted) => true,
            (Submitted | Shortlisted, Won | Lost) => true,
            (from, Withdrawn) => from.is_open(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderDraft {
    pub title: String,
    pub reference: Option<String>,
    pub authority: String,
    pub estimated_value: Option<Money>,
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderApplication {
    pub id: TenderId,
    pub tenant_id: TenantId,
    pub title: String,
    pub reference: Option<String>,
    pub authority: String,
    pub estimated_value: Option<Money>,
    pub deadline: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: TenderStatus,
    /// Opportunity this application was raised from, if any.
    pub opportunity_id: Option<OpportunityId>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for TenderApplication {
    type Id = TenderId;

    fn id(&self) -> &TenderId {
        &self.id
    }
}

impl TenderApplication {
    pub fn create(
        tenant_id: TenantId,
        draft: TenderDraft,
        opportunity_id: Option<OpportunityId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: TenderId::new(),
            tenant_id,
            title: required_text("title", &draft.title)?,
            reference: optional_text(draft.reference),
            authority: required_text("authority", &draft.authority)?,
            estimated_value: draft.estimated_value,
            deadline: draft.deadline,
            notes: optional_text(draft.notes),
            status: TenderStatus::Identified,
            opportunity_id,
            submitted_at: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, draft: TenderDraft, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.is_open() {
            return Err(DomainError::invariant("closed tenders cannot be edited"));
        }
        self.title = required_text("title", &draft.title)?;
        self.reference = optional_text(draft.reference);
        self.authority = required_text("authority", &draft.authority)?;
        self.estimated_value = draft.estimated_value;
        self.deadline = draft.deadline;
        self.notes = optional_text(draft.notes);
        self.updated_at = now;
        Ok(())
    }

    pub fn transition(&mut self, next: TenderStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "tender cannot move from {} to {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        if next == TenderStatus::Submitted {
            if let Some(deadline) = self.deadline {
                if now.date_naive() > deadline {
                    return Err(DomainError::invariant("submission deadline has passed"));
                }
            }
            self.submitted_at = Some(now);
        }
        if !next.is_open() {
            self.decided_at = Some(now);
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(deadline: Option<NaiveDate>) -> TenderDraft {
        TenderDraft {
            title: "Supported living framework".into(),
            reference: Some("  ".into()),
            authority: "Leeds City Council".into(),
            estimated_value: None,
            deadline,
            notes: None,
        }
    }

    #[test]
    fn happy_path_stamps_timestamps() {
        let now = Utc::now();
        let mut t = TenderApplication::create(TenantId::new(), draft(None), None, now).unwrap();
        assert_eq!(t.reference, None);
        t.transition(TenderStatus::Drafting, now).unwrap();
        t.transition(TenderStatus::Submitted, now).unwrap();
        assert_eq!(t.submitted_at, Some(now));
        t.transition(TenderStatus::Won, now).unwrap();
        assert_eq!(t.decided_at, Some(now));
        assert!(t.transition(TenderStatus::Withdrawn, now).is_err());
        assert!(t.update(draft(None), now).is_err());
    }

    #[test]
    fn cannot_skip_steps() {
        let now = Utc::now();
        let mut t = TenderApplication::create(TenantId::new(), draft(None), None, now).unwrap();
        assert!(t.transition(TenderStatus::Submitted, now).is_err());
        assert!(t.transition(TenderStatus::Won, now).is_err());
        t.transition(TenderStatus::Withdrawn, now).unwrap();
    }

    #[test]
    fn late_submission_is_refused() {
        let now = Utc::now();
        let yesterday = (now - Duration::days(1)).date_naive();
        let mut t = TenderApplication::create(TenantId::new(), draft(Some(yesterday)), None, now).unwrap();
        t.transition(TenderStatus::Drafting, now).unwrap();
        assert!(t.transition(TenderStatus::Submitted, now).is_err());
        assert_eq!(t.status, TenderStatus::Drafting);
    }

    #[test]
    fn withdrawal_only_from_open_statuses() {
        for from in TenderStatus::ALL {
            assert_eq!(from.can_transition_to(TenderStatus::Withdrawn), from.is_open());
        }
    }
}
