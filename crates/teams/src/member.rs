use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{DomainError, DomainResult, Entity, TeamId, TeamMemberId, TenantId, UserId};

/// Role within a team. Its manager level drives approval eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Member,
    TeamLead,
    Manager,
    SeniorManager,
}

impl TeamRole {
    pub fn manager_level(self) -> u8 {
        match self {
            TeamRole::Member => 0,
            TeamRole::TeamLead => 1,
            TeamRole::Manager => 2,
            TeamRole::SeniorManager => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: TeamMemberId,
    pub tenant_id: TenantId,
    pub team_id: TeamId,
    pub user_id: UserId,
    pub role: TeamRole,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl Entity for TeamMember {
    type Id = TeamMemberId;

    fn id(&self) -> &TeamMemberId {
        &self.id
    }
}

impl TeamMember {
    /// Add `user_id` to `team_id`, refusing a second active membership.
    pub fn join<'a>(
        existing: impl IntoIterator<Item = &'a TeamMember>,
        tenant_id: TenantId,
        team_id: TeamId,
        user_id: UserId,
        role: TeamRole,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let already = existing
            .into_iter()
            .any(|m| m.is_active && m.team_id == team_id && m.user_id == user_id);
        if already {
            return Err(DomainError::conflict("user is already a member of this team"));
        }
        Ok(Self {
            id: TeamMemberId::new(),
            tenant_id,
            team_id,
            user_id,
            role,
            is_active: true,
            joined_at: now,
        })
    }

    pub fn leave(&mut self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::invariant("membership has already ended"));
        }
        self.is_active = false;
        Ok(())
    }
}

/// Highest manager level a user holds across active memberships.
pub fn manager_level_of<'a>(memberships: impl IntoIterator<Item = &'a TeamMember>, user_id: UserId) -> u8 {
    memberships
        .into_iter()
        .filter(|m| m.is_active && m.user_id == user_id)
        .map(|m| m.role.manager_level())
        .max()
        .unwrap_or(0)
}
