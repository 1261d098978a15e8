use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{
    ContractId, DomainError, DomainResult, Entity, Money, PaymentId, PersonId, TenantId,
    optional_text, required_text,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Bacs,
    Cheque,
    Card,
    DirectDebit,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub tenant_id: TenantId,
    pub contract_id: ContractId,
    pub person_id: Option<PersonId>,
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub reference: String,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &PaymentId {
        &self.id
    }
}

impl Payment {
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        tenant_id: TenantId,
        contract_id: ContractId,
        person_id: Option<PersonId>,
        amount: Money,
        paid_on: NaiveDate,
        reference: &str,
        method: PaymentMethod,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if amount == Money::ZERO {
            return Err(DomainError::validation("payment amount must be greater than zero"));
        }
        if paid_on > now.date_naive() {
            return Err(DomainError::validation("payment date cannot be in the future"));
        }
        Ok(Self {
            id: PaymentId::new(),
            tenant_id,
            contract_id,
            person_id,
            amount,
            paid_on,
            reference: required_text("payment reference", reference)?,
            method,
            notes: optional_text(notes),
            is_active: true,
            created_at: now,
        })
    }

    pub fn void(&mut self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::invariant("payment has already been removed"));
        }
        self.is_active = false;
        Ok(())
    }
}

/// Per-contract payment totals over active payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentTotals {
    pub contract_id: ContractId,
    pub count: usize,
    pub total: Money,
    pub last_paid_on: Option<NaiveDate>,
}

pub fn payment_totals<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Vec<PaymentTotals> {
    let mut by_contract: BTreeMap<ContractId, PaymentTotals> = BTreeMap::new();
    for p in payments.into_iter().filter(|p| p.is_active) {
        let entry = by_contract.entry(p.contract_id).or_insert(PaymentTotals {
            contract_id: p.contract_id,
            count: 0,
            total: Money::ZERO,
            last_paid_on: None,
        });
        entry.count += 1;
        entry.total = [entry.total, p.amount].into_iter().sum();
        entry.last_paid_on = entry.last_paid_on.max(Some(p.paid_on));
    }
    by_contract.into_values().collect()
}
