//! Versioned rates.
//!
//! A rate prices one contract type in one local authority. Each change is a
//! new version; versions for the same pair never overlap and the open one
//! (no `effective_to`) is the current price.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{
    ContractTypeId, DomainError, DomainResult, Entity, LocalAuthorityId, Money, RateId, TenantId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    Hourly,
    Daily,
    Weekly,
    Annual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub id: RateId,
    pub tenant_id: TenantId,
    pub contract_type_id: ContractTypeId,
    pub local_authority_id: LocalAuthorityId,
    pub amount: Money,
    pub unit: RateUnit,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Rate {
    type Id = RateId;

    fn id(&self) -> &RateId {
        &self.id
    }
}

impl Rate {
    pub fn same_pair(&self, contract_type_id: ContractTypeId, local_authority_id: LocalAuthorityId) -> bool {
        self.contract_type_id == contract_type_id && self.local_authority_id == local_authority_id
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| date <= to)
    }
}

/// Outcome of adding a rate version: the new row plus the previously open
/// version, closed the day before the new one starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateVersionPlan {
    pub new_rate: Rate,
    pub closed_previous: Option<Rate>,
}

/// Plan a new version for (`contract_type_id`, `local_authority_id`).
///
/// The new version must start after every existing version of the pair.
#[allow(clippy::too_many_arguments)]
pub fn plan_rate_version<'a>(
    existing: impl IntoIterator<Item = &'a Rate>,
    tenant_id: TenantId,
    contract_type_id: ContractTypeId,
    local_authority_id: LocalAuthorityId,
    amount: Money,
    unit: RateUnit,
    effective_from: NaiveDate,
    now: DateTime<Utc>,
) -> DomainResult<RateVersionPlan> {
    let versions: Vec<&Rate> = existing
        .into_iter()
        .filter(|r| r.same_pair(contract_type_id, local_authority_id))
        .collect();

    if let Some(latest) = versions.iter().map(|r| r.effective_from).max() {
        if effective_from <= latest {
            return Err(DomainError::validation(format!(
                "a new rate must start after {latest}, the start of the latest version"
            )));
        }
    }

    let closed_previous = versions
        .iter()
        .find(|r| r.effective_to.is_none_or(|to| to >= effective_from))
        .map(|open| Rate {
            effective_to: Some(effective_from - Duration::days(1)),
            ..(*open).clone()
        });

    Ok(RateVersionPlan {
        new_rate: Rate {
            id: RateId::new(),
            tenant_id,
            contract_type_id,
            local_authority_id,
            amount,
            unit,
            effective_from,
            effective_to: None,
            created_at: now,
        },
        closed_previous,
    })
}

/// The rate version in force for the pair on `on`.
pub fn current_rate<'a>(
    rates: impl IntoIterator<Item = &'a Rate>,
    contract_type_id: ContractTypeId,
    local_authority_id: LocalAuthorityId,
    on: NaiveDate,
) -> Option<&'a Rate> {
    rates
        .into_iter()
        .filter(|r| r.same_pair(contract_type_id, local_authority_id) && r.covers(on))
        .max_by_key(|r| r.effective_from)
}
