//! User accounts.
//!
//! A user belongs to exactly one organisation and holds one role there.
//! Deactivated users keep their row (soft delete) but cannot sign in and do
//! not occupy a seat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{DomainError, DomainResult, Entity, TenantId, UserId, required_text};

use crate::Role;

/// Lowercase + trim an email address, rejecting obviously malformed input.
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let normalized = email.trim().to_lowercase();
    match normalized.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => {
            Ok(normalized)
        }
        _ => Err(DomainError::validation(format!("invalid email address '{}'", email.trim()))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

impl User {
    /// Register a new, unverified user.
    ///
    /// `password_hash` must already be a PHC hash (see [`crate::hash_password`]).
    pub fn register(
        tenant_id: TenantId,
        email: &str,
        display_name: &str,
        role: Role,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: UserId::new(),
            tenant_id,
            email: normalize_email(email)?,
            display_name: required_text("display name", display_name)?,
            role,
            password_hash,
            email_verified: false,
            verification_token: Some(uuid::Uuid::new_v4().simple().to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn verify_email(&mut self, token: &str, now: DateTime<Utc>) -> DomainResult<()> {
        match &self.verification_token {
            Some(expected) if expected == token.trim() => {
                self.email_verified = true;
                self.verification_token = None;
                self.updated_at = now;
                Ok(())
            }
            _ => Err(DomainError::validation("verification token is invalid or already used")),
        }
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::invariant("user is already inactive"));
        }
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    pub fn reactivate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_active {
            return Err(DomainError::invariant("user is already active"));
        }
        self.is_active = true;
        self.updated_at = now;
        Ok(())
    }

    /// Change the user's role on behalf of an actor holding `actor_rank`.
    ///
    /// Nobody can grant a role ranked above their own.
    pub fn change_role(&mut self, role: Role, actor_rank: u8, now: DateTime<Utc>) -> DomainResult<()> {
        if role.rank() > actor_rank {
            return Err(DomainError::unauthorized(format!("cannot grant role '{role}'")));
        }
        if self.role.rank() > actor_rank {
            return Err(DomainError::unauthorized("cannot change the role of a more privileged user"));
        }
        self.role = role;
        self.updated_at = now;
        Ok(())
    }

    pub fn can_sign_in(&self) -> bool {
        self.is_active
    }
}
