use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caretrack_auth::Role;
use caretrack_core::{ApprovalRuleId, DomainError, DomainResult, Entity, TenantId, optional_text, required_text};

/// Highest manager level a team role can carry.
const MAX_MANAGER_LEVEL: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Create,
    Update,
    Delete,
    Any,
}

impl ApprovalAction {
    fn covers(self, action: ApprovalAction) -> bool {
        self == ApprovalAction::Any || self == action
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRuleDraft {
    pub entity_type: String,
    pub field: Option<String>,
    pub action: ApprovalAction,
    pub required_role: Option<Role>,
    pub min_manager_level: Option<u8>,
    #[serde(default)]
    pub priority: i32,
    pub description: Option<String>,
}

/// Who must approve changes to an entity type (optionally a single field).
///
/// `entity_type` may be `*` to cover every type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub id: ApprovalRuleId,
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub field: Option<String>,
    pub action: ApprovalAction,
    pub required_role: Option<Role>,
    pub min_manager_level: Option<u8>,
    pub priority: i32,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for ApprovalRule {
    type Id = ApprovalRuleId;

    fn id(&self) -> &ApprovalRuleId {
        &self.id
    }
}

impl ApprovalRule {
    pub fn create(tenant_id: TenantId, draft: ApprovalRuleDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let entity_type = required_text("entity type", &draft.entity_type)?.to_lowercase();
        if draft.required_role.is_none() && draft.min_manager_level.is_none() {
            return Err(DomainError::validation(
                "a rule needs a required role, a minimum manager level, or both",
            ));
        }
        if let Some(role) = &draft.required_role {
            if Role::parse_known(role.as_str()).is_none() {
                return Err(DomainError::validation(format!("unknown role '{role}'")));
            }
        }
        if draft.min_manager_level.is_some_and(|l| l > MAX_MANAGER_LEVEL) {
            return Err(DomainError::validation(format!(
                "minimum manager level must be between 0 and {MAX_MANAGER_LEVEL}"
            )));
        }

        Ok(Self {
            id: ApprovalRuleId::new(),
            tenant_id,
            entity_type,
            field: optional_text(draft.field).map(|f| f.to_lowercase()),
            action: draft.action,
            required_role: draft.required_role.and_then(|r| Role::parse_known(r.as_str())),
            min_manager_level: draft.min_manager_level,
            priority: draft.priority,
            description: optional_text(draft.description),
            is_active: true,
            created_at: now,
        })
    }

    pub fn deactivate(&mut self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::invariant("approval rule is already inactive"));
        }
        self.is_active = false;
        Ok(())
    }

    fn applies_to(&self, entity_type: &str, field: Option<&str>, action: ApprovalAction) -> bool {
        self.is_active
            && (self.entity_type == "*" || self.entity_type == entity_type)
            && match (&self.field, field) {
                (None, _) => true,
                (Some(rule_field), Some(field)) => rule_field == field,
                (Some(_), None) => false,
            }
            && self.action.covers(action)
    }

    /// Sort key: lower wins. Priority first, then the more specific rule.
    fn rank(&self) -> (i32, bool, bool, bool, ApprovalRuleId) {
        (
            self.priority,
            self.field.is_none(),
            self.action == ApprovalAction::Any,
            self.entity_type == "*",
            self.id,
        )
    }
}

/// The governing rule for one change, if any.
pub fn find_rule<'a>(
    rules: impl IntoIterator<Item = &'a ApprovalRule>,
    entity_type: &str,
    field: Option<&str>,
    action: ApprovalAction,
) -> Option<&'a ApprovalRule> {
    let entity_type = entity_type.to_lowercase();
    let field = field.map(str::to_lowercase);
    rules
        .into_iter()
        .filter(|r| r.applies_to(&entity_type, field.as_deref(), action))
        .min_by_key(|r| r.rank())
}

/// The governing rule for an update touching several fields: the best rule
/// matching any one of them. With no fields only field-less rules apply.
pub fn find_rule_for_fields<'a>(
    rules: &'a [ApprovalRule],
    entity_type: &str,
    fields: &[&str],
    action: ApprovalAction,
) -> Option<&'a ApprovalRule> {
    if fields.is_empty() {
        return find_rule(rules, entity_type, None, action);
    }
    fields
        .iter()
        .filter_map(|f| find_rule(rules, entity_type, Some(*f), action))
        .min_by_key(|r| r.rank())
}

/// Whether someone holding `roles` and `manager_level` satisfies the rule.
///
/// A required role is met by that role or any role ranked above it.
pub fn can_approve(rule: &ApprovalRule, roles: &[Role], manager_level: u8) -> bool {
    let role_ok = rule
        .required_role
        .as_ref()
        .is_none_or(|required| roles.iter().any(|r| r.rank() >= required.rank()));
    let level_ok = rule.min_manager_level.is_none_or(|min| manager_level >= min);
    role_ok && level_ok
}


#[cfg(test)]
mod props {
    use super::*;
    use caretrack_auth::roles::STAFF;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn the_chosen_rule_has_the_lowest_applicable_priority(priorities in proptest::collection::vec(-5i32..5, 1..10)) {
            let tenant = TenantId::new();
            let rules: Vec<ApprovalRule> = priorities
                .iter()
                .map(|p| {
                    ApprovalRule::create(
                        tenant,
                        ApprovalRuleDraft {
                            entity_type: "person".into(),
                            field: None,
                            action: ApprovalAction::Any,
                            required_role: Some(STAFF),
                            min_manager_level: None,
                            priority: *p,
                            description: None,
                        },
                        Utc::now(),
                    )
                    .unwrap()
                })
                .collect();

            let chosen = find_rule(&rules, "person", Some("notes"), ApprovalAction::Delete).unwrap();
            prop_assert_eq!(chosen.priority, *priorities.iter().min().unwrap());
            let again = find_rule(rules.iter().rev(), "person", Some("notes"), ApprovalAction::Delete).unwrap();
            prop_assert_eq!(chosen.id, again.id);
        }
    }
}
