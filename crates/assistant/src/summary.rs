use std::collections::BTreeMap;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use caretrack_approvals::ApprovalRequest;
use caretrack_contracts::{Contract, Payment, Rate};
use caretrack_core::{ContractId, Money, TenantId};
use caretrack_people::Person;
use caretrack_teams::Team;
use caretrack_tenders::TenderApplication;

/// Contracts ending within this many days count as expiring.
pub const EXPIRY_WINDOW_DAYS: i64 = 90;

/// Records the summary is computed from. Inactive rows may be included;
/// they are filtered here.
#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'a> {
    pub contracts: &'a [Contract],
    pub people: &'a [Person],
    pub payments: &'a [Payment],
    pub tenders: &'a [TenderApplication],
    pub approvals: &'a [ApprovalRequest],
    pub teams: &'a [Team],
    pub rates: &'a [Rate],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringContract {
    pub id: ContractId,
    pub title: String,
    pub reference: String,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub tenant_id: TenantId,
    pub as_of: NaiveDate,
    pub contracts_by_status: BTreeMap<String, usize>,
    pub active_contracts: usize,
    /// Soonest first.
    pub expiring_soon: Vec<ExpiringContract>,
    pub total_annual_value: Money,
    pub people_count: usize,
    pub payments_last_12_months: Money,
    pub payment_count_last_12_months: usize,
    pub tenders_by_status: BTreeMap<String, usize>,
    pub open_tenders: usize,
    pub open_approval_requests: usize,
    pub team_count: usize,
    pub current_rates: usize,
}

impl PortfolioSummary {
    pub fn build(tenant_id: TenantId, input: SummaryInput<'_>, today: NaiveDate) -> Self {
        let contracts: Vec<&Contract> = input
            .contracts
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.is_active)
            .collect();

        let mut contracts_by_status = BTreeMap::new();
        for c in &contracts {
            *contracts_by_status.entry(c.status.as_str().to_string()).or_insert(0) += 1;
        }

        let mut expiring_soon: Vec<ExpiringContract> = contracts
            .iter()
            .filter(|c| c.is_expiring_within(EXPIRY_WINDOW_DAYS, today))
            .filter_map(|c| {
                c.end_date.map(|end_date| ExpiringContract {
                    id: c.id,
                    title: c.title.clone(),
                    reference: c.reference.clone(),
                    end_date,
                })
            })
            .collect();
        expiring_soon.sort_by_key(|e| (e.end_date, e.reference.clone()));

        let live: Vec<&&Contract> = contracts.iter().filter(|c| c.status.is_live()).collect();
        let total_annual_value = live.iter().filter_map(|c| c.annual_value).sum();

        let year_ago = today.checked_sub_months(Months::new(12)).unwrap_or(NaiveDate::MIN);
        let recent_payments: Vec<&Payment> = input
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.is_active && p.paid_on > year_ago && p.paid_on <= today)
            .collect();

        let tenders: Vec<&TenderApplication> = input.tenders.iter().filter(|t| t.tenant_id == tenant_id).collect();
        let mut tenders_by_status = BTreeMap::new();
        for t in &tenders {
            *tenders_by_status.entry(t.status.as_str().to_string()).or_insert(0) += 1;
        }

        Self {
            tenant_id,
            as_of: today,
            active_contracts: live.len(),
            contracts_by_status,
            expiring_soon,
            total_annual_value,
            people_count: input.people.iter().filter(|p| p.tenant_id == tenant_id && p.is_active).count(),
            payment_count_last_12_months: recent_payments.len(),
            payments_last_12_months: recent_payments.iter().map(|p| p.amount).sum(),
            open_tenders: tenders.iter().filter(|t| t.status.is_open()).count(),
            tenders_by_status,
            open_approval_requests: input
                .approvals
                .iter()
                .filter(|a| a.tenant_id == tenant_id && a.is_pending())
                .count(),
            team_count: input.teams.iter().filter(|t| t.tenant_id == tenant_id && t.is_active).count(),
            current_rates: input
                .rates
                .iter()
                .filter(|r| r.tenant_id == tenant_id && r.covers(today))
                .count(),
        }
    }
}
