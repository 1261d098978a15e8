//! Audit trail.
//!
//! Each mutation writes an [`AuditEntry`] in the same batch as the change
//! itself, carrying a field-level diff of the record before and after.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

use caretrack_core::{AuditEntryId, Entity, TenantId, UserId};

use crate::error::InfraError;

/// Fields never copied into the audit trail.
const REDACTED_FIELDS: &[&str] = &["password_hash", "verification_token"];
/// Bookkeeping fields that change on every write.
const IGNORED_FIELDS: &[&str] = &["updated_at"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub tenant_id: TenantId,
    /// `None` for system actions (scheduled jobs, self-registration).
    pub actor: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub changes: JsonValue,
    pub at: DateTime<Utc>,
}

impl Entity for AuditEntry {
    type Id = AuditEntryId;

    fn id(&self) -> &AuditEntryId {
        &self.id
    }
}

impl AuditEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn record<T: Serialize>(
        tenant_id: TenantId,
        actor: Option<UserId>,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        before: Option<&T>,
        after: Option<&T>,
        at: DateTime<Utc>,
    ) -> Result<Self, InfraError> {
        let before = before.map(serde_json::to_value).transpose()?.unwrap_or(JsonValue::Null);
        let after = after.map(serde_json::to_value).transpose()?.unwrap_or(JsonValue::Null);
        Ok(Self {
            id: AuditEntryId::new(),
            tenant_id,
            actor,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            changes: diff_json(&before, &after),
            at,
        })
    }
}

fn fields(value: &JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map.clone(),
        JsonValue::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

/// Top-level field diff: `{ field: { "from": .., "to": .. } }` for every
/// field whose value differs. Sensitive fields show as `"[redacted]"`.
pub fn diff_json(before: &JsonValue, after: &JsonValue) -> JsonValue {
    let before = fields(before);
    let after = fields(after);

    let mut keys: Vec<&String> = before.keys().chain(after.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut changes = Map::new();
    for key in keys {
        if IGNORED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let from = before.get(key).cloned().unwrap_or(JsonValue::Null);
        let to = after.get(key).cloned().unwrap_or(JsonValue::Null);
        if from == to {
            continue;
        }
        let entry = if REDACTED_FIELDS.contains(&key.as_str()) {
            json!({ "from": "[redacted]", "to": "[redacted]" })
        } else {
            json!({ "from": from, "to": to })
        };
        changes.insert(key.clone(), entry);
    }
    JsonValue::Object(changes)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor: Option<UserId>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub const DEFAULT_LIMIT: usize = 100;

    fn accepts(&self, entry: &AuditEntry) -> bool {
        self.entity_type.as_deref().is_none_or(|t| entry.entity_type.eq_ignore_ascii_case(t))
            && self.entity_id.is_none_or(|id| entry.entity_id == id)
            && self.actor.is_none_or(|actor| entry.actor == Some(actor))
    }

    /// Matching entries, newest first, capped at `limit`.
    pub fn apply(&self, mut entries: Vec<AuditEntry>) -> Vec<AuditEntry> {
        entries.retain(|e| self.accepts(e));
        entries.sort_by(|a, b| b.at.cmp(&a.at).then_with(|| b.id.cmp(&a.id)));
        entries.truncate(self.limit.unwrap_or(Self::DEFAULT_LIMIT));
        entries
    }
}
