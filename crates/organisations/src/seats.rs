//! Seat-change requests.
//!
//! An organisation asks for a new seat limit; a platform superadmin decides.
//! Approval changes two records (request + organisation) which callers must
//! persist together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{DomainError, DomainResult, Entity, SeatChangeRequestId, TenantId, UserId, optional_text};

use crate::Organisation;

pub const MAX_SEATS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatChangeRequest {
    pub id: SeatChangeRequestId,
    pub tenant_id: TenantId,
    pub current_seats: u32,
    pub requested_seats: u32,
    pub reason: Option<String>,
    pub status: SeatRequestStatus,
    pub requested_by: UserId,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for SeatChangeRequest {
    type Id = SeatChangeRequestId;

    fn id(&self) -> &SeatChangeRequestId {
        &self.id
    }
}

impl SeatChangeRequest {
    pub fn new(
        organisation: &Organisation,
        requested_seats: u32,
        reason: Option<String>,
        requested_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if requested_seats == 0 || requested_seats > MAX_SEATS {
            return Err(DomainError::validation(format!(
                "requested seats must be between 1 and {MAX_SEATS}"
            )));
        }
        if requested_seats == organisation.seat_limit {
            return Err(DomainError::validation("requested seats equal the current limit"));
        }
        if requested_seats < organisation.seats_used {
            return Err(DomainError::validation(format!(
                "{} seats are in use; deactivate users before reducing the limit",
                organisation.seats_used
            )));
        }

        Ok(Self {
            id: SeatChangeRequestId::new(),
            tenant_id: organisation.id,
            current_seats: organisation.seat_limit,
            requested_seats,
            reason: optional_text(reason),
            status: SeatRequestStatus::Pending,
            requested_by,
            decided_by: None,
            decided_at: None,
            decision_note: None,
            created_at: now,
        })
    }

    fn ensure_pending(&self) -> DomainResult<()> {
        if self.status != SeatRequestStatus::Pending {
            return Err(DomainError::invariant("seat change request has already been decided"));
        }
        Ok(())
    }

    /// Approve the request and apply the new limit to `organisation`.
    pub fn approve(
        &mut self,
        organisation: &mut Organisation,
        decided_by: UserId,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_pending()?;
        if organisation.id != self.tenant_id {
            return Err(DomainError::invariant("seat change request belongs to another organisation"));
        }
        organisation.set_seat_limit(self.requested_seats, now)?;

        self.status = SeatRequestStatus::Approved;
        self.decided_by = Some(decided_by);
        self.decided_at = Some(now);
        self.decision_note = optional_text(note);
        Ok(())
    }

    pub fn reject(&mut self, decided_by: UserId, note: Option<String>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = SeatRequestStatus::Rejected;
        self.decided_by = Some(decided_by);
        self.decided_at = Some(now);
        self.decision_note = optional_text(note);
        Ok(())
    }
}
