//! `caretrack-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    ApprovalRequestId, ApprovalRuleId, AuditEntryId, ContractId, ContractTypeId, GlossaryTermId,
    LocalAuthorityId, OpportunityId, PaymentId, PersonId, PreferenceId, RateId,
    SeatChangeRequestId, TeamId, TeamMemberId, TenantId, TenderId, UserId,
};
pub use value_object::{Money, ValueObject};

/// Trim a required text field, rejecting blank input.
pub fn required_text(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank collapses to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
