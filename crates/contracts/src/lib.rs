//! Contracts, their reference data, versioned rates and payments.

pub mod contract;
pub mod payment;
pub mod rate;
pub mod reference;

pub use contract::{Contract, ContractDraft, ContractStatus, ensure_unique_reference};
pub use payment::{Payment, PaymentMethod, PaymentTotals, payment_totals};
pub use rate::{Rate, RateUnit, RateVersionPlan, current_rate, plan_rate_version};
pub use reference::{ContractType, LocalAuthority, ensure_unique_name};
