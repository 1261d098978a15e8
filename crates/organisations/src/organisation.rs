use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{DomainError, DomainResult, Entity, TenantId, required_text};

/// Seats granted to a newly registered organisation.
pub const DEFAULT_SEAT_LIMIT: u32 = 5;

/// An organisation: the tenant boundary owning users, contracts and teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: TenantId,
    pub name: String,
    pub seat_limit: u32,
    /// Active users, recomputed whenever a user is added or (de)activated.
    pub seats_used: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Organisation {
    type Id = TenantId;

    fn id(&self) -> &TenantId {
        &self.id
    }
}

impl Organisation {
    pub fn new(name: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: TenantId::new(),
            name: required_text("organisation name", name)?,
            seat_limit: DEFAULT_SEAT_LIMIT,
            seats_used: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn rename(&mut self, name: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.name = required_text("organisation name", name)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn seats_available(&self) -> u32 {
        self.seat_limit.saturating_sub(self.seats_used)
    }

    pub fn can_add_user(&self) -> bool {
        self.seats_used < self.seat_limit
    }

    /// Check there is room for one more active user.
    pub fn ensure_seat_available(&self) -> DomainResult<()> {
        if self.can_add_user() {
            Ok(())
        } else {
            Err(DomainError::invariant(format!(
                "all {} seats are in use; request more seats first",
                self.seat_limit
            )))
        }
    }

    pub fn recompute_seats(&mut self, active_users: usize, now: DateTime<Utc>) {
        self.seats_used = u32::try_from(active_users).unwrap_or(u32::MAX);
        self.updated_at = now;
    }

    pub(crate) fn set_seat_limit(&mut self, seats: u32, now: DateTime<Utc>) -> DomainResult<()> {
        if seats < self.seats_used {
            return Err(DomainError::invariant(format!(
                "cannot reduce seats to {seats}: {} are in use",
                self.seats_used
            )));
        }
        self.seat_limit = seats;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_organisation_has_default_seats() {
        let org = Organisation::new("  Acme Care ", Utc::now()).unwrap();
        assert_eq!(org.name, "Acme Care");
        assert_eq!(org.seat_limit, DEFAULT_SEAT_LIMIT);
        assert_eq!(org.seats_available(), DEFAULT_SEAT_LIMIT);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Organisation::new(" ", Utc::now()).is_err());
    }

    #[test]
    fn seat_limit_is_enforced() {
        let mut org = Organisation::new("Acme", Utc::now()).unwrap();
        org.recompute_seats(DEFAULT_SEAT_LIMIT as usize, Utc::now());
        assert!(!org.can_add_user());
        assert!(org.ensure_seat_available().is_err());
        org.recompute_seats(1, Utc::now());
        assert!(org.ensure_seat_available().is_ok());
    }
}
