//! Per-organisation reference data: contract types and local authorities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{
    ContractTypeId, DomainError, DomainResult, Entity, LocalAuthorityId, TenantId, optional_text,
    required_text,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractType {
    pub id: ContractTypeId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for ContractType {
    type Id = ContractTypeId;

    fn id(&self) -> &ContractTypeId {
        &self.id
    }
}

impl ContractType {
    pub fn new(tenant_id: TenantId, name: &str, description: Option<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: ContractTypeId::new(),
            tenant_id,
            name: required_text("contract type name", name)?,
            description: optional_text(description),
            is_active: true,
            created_at: now,
        })
    }

    pub fn deactivate(&mut self) -> DomainResult<()> {
        deactivate(&mut self.is_active, "contract type")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAuthority {
    pub id: LocalAuthorityId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Short code such as an ONS code (`E08000025`), stored upper case.
    pub code: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for LocalAuthority {
    type Id = LocalAuthorityId;

    fn id(&self) -> &LocalAuthorityId {
        &self.id
    }
}

impl LocalAuthority {
    pub fn new(tenant_id: TenantId, name: &str, code: Option<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: LocalAuthorityId::new(),
            tenant_id,
            name: required_text("local authority name", name)?,
            code: optional_text(code).map(|c| c.to_uppercase()),
            is_active: true,
            created_at: now,
        })
    }

    pub fn deactivate(&mut self) -> DomainResult<()> {
        deactivate(&mut self.is_active, "local authority")
    }
}

fn deactivate(is_active: &mut bool, what: &str) -> DomainResult<()> {
    if !*is_active {
        return Err(DomainError::invariant(format!("{what} is already inactive")));
    }
    *is_active = false;
    Ok(())
}

/// Reject `candidate` if an active row already uses the same name
/// (case-insensitive).
pub fn ensure_unique_name<'a>(
    what: &str,
    existing: impl IntoIterator<Item = (&'a str, bool)>,
    candidate: &str,
) -> DomainResult<()> {
    let wanted = candidate.trim().to_lowercase();
    let clash = existing
        .into_iter()
        .any(|(name, active)| active && name.trim().to_lowercase() == wanted);
    if clash {
        return Err(DomainError::conflict(format!("{what} '{}' already exists", candidate.trim())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_code_is_upper_cased() {
        let la = LocalAuthority::new(TenantId::new(), "Leeds", Some(" e08000035 ".into()), Utc::now()).unwrap();
        assert_eq!(la.code.as_deref(), Some("E08000035"));
    }

    #[test]
    fn duplicate_active_names_conflict() {
        let rows = [("Domiciliary Care", true), ("Supported Living", false)];
        assert!(ensure_unique_name("contract type", rows, "domiciliary care ").is_err());
        assert!(ensure_unique_name("contract type", rows, "Supported Living").is_ok());
    }

    #[test]
    fn deactivation_happens_once() {
        let mut ct = ContractType::new(TenantId::new(), "Respite", None, Utc::now()).unwrap();
        ct.deactivate().unwrap();
        assert!(!ct.is_active);
        assert!(ct.deactivate().is_err());
    }
}
