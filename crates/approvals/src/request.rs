use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use caretrack_auth::Role;
use caretrack_core::{
    ApprovalRequestId, ApprovalRuleId, DomainError, DomainResult, Entity, TenantId, UserId, optional_text,
};

use crate::rule::{ApprovalAction, ApprovalRule, can_approve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A change held back until someone allowed by `rule_id` signs it off.
///
/// `proposed` carries the change exactly as submitted so it can be applied
/// on approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub field: Option<String>,
    pub action: ApprovalAction,
    pub proposed: Value,
    pub rule_id: ApprovalRuleId,
    pub requested_by: UserId,
    pub status: ApprovalStatus,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for ApprovalRequest {
    type Id = ApprovalRequestId;

    fn id(&self) -> &ApprovalRequestId {
        &self.id
    }
}

impl ApprovalRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        rule: &ApprovalRule,
        entity_type: &str,
        entity_id: Uuid,
        field: Option<&str>,
        action: ApprovalAction,
        proposed: Value,
        requested_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApprovalRequestId::new(),
            tenant_id: rule.tenant_id,
            entity_type: entity_type.to_lowercase(),
            entity_id,
            field: field.map(str::to_lowercase),
            action,
            proposed,
            rule_id: rule.id,
            requested_by,
            status: ApprovalStatus::Pending,
            decided_by: None,
            decided_at: None,
            comment: None,
            created_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    fn ensure_decidable(&self, rule: &ApprovalRule, decider: UserId, roles: &[Role], manager_level: u8) -> DomainResult<()> {
        if !self.is_pending() {
            return Err(DomainError::invariant("approval request has already been decided"));
        }
        if rule.id != self.rule_id {
            return Err(DomainError::invariant("rule does not govern this request"));
        }
        if decider == self.requested_by {
            return Err(DomainError::unauthorized("you cannot decide your own approval request"));
        }
        if !can_approve(rule, roles, manager_level) {
            return Err(DomainError::unauthorized("you do not meet the approval rule for this request"));
        }
        Ok(())
    }

    fn decide(&mut self, status: ApprovalStatus, decider: UserId, comment: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.decided_by = Some(decider);
        self.decided_at = Some(now);
        self.comment = optional_text(comment);
    }

    pub fn approve(
        &mut self,
        rule: &ApprovalRule,
        approver: UserId,
        roles: &[Role],
        manager_level: u8,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_decidable(rule, approver, roles, manager_level)?;
        self.decide(ApprovalStatus::Approved, approver, comment, now);
        Ok(())
    }

    pub fn reject(
        &mut self,
        rule: &ApprovalRule,
        approver: UserId,
        roles: &[Role],
        manager_level: u8,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_decidable(rule, approver, roles, manager_level)?;
        self.decide(ApprovalStatus::Rejected, approver, comment, now);
        Ok(())
    }
}
