//! Approval workflow: rules deciding who must sign off a change, and the
//! requests raised when the person making the change cannot.

pub mod request;
pub mod rule;

pub use request::{ApprovalRequest, ApprovalStatus};
pub use rule::{ApprovalAction, ApprovalRule, ApprovalRuleDraft, can_approve, find_rule, find_rule_for_fields};
