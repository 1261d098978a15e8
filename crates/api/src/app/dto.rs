//! Request/response DTOs and small JSON mapping helpers.
//!
//! Domain drafts (`ContractDraft`, `PersonDetails`, ...) deserialize straight
//! from request bodies; only shapes with no domain counterpart live here.
//! Amounts are integer pence throughout.

use std::str::FromStr;

use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use caretrack_approvals::ApprovalStatus;
use caretrack_auth::User;
use caretrack_contracts::{ContractStatus, PaymentMethod, RateUnit};
use caretrack_core::{
    ContractId, ContractTypeId, DomainError, LocalAuthorityId, Money, OpportunityId, PersonId, TenantId,
    UserId,
};
use caretrack_organisations::SeatRequestStatus;
use caretrack_people::IdentifierKind;
use caretrack_teams::TeamRole;
use caretrack_tenders::{TenderDraft, TenderStatus};

use crate::app::errors::ApiError;

/// Parse a path segment into a typed id, answering `400 invalid_id`.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(ApiError::from)
}

/// `{ "items": [...] }` list envelope.
pub fn items<T: Serialize>(items: Vec<T>) -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub fn created<T: Serialize>(body: T) -> axum::response::Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

pub fn ok<T: Serialize>(body: T) -> axum::response::Response {
    (StatusCode::OK, Json(body)).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth / users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub organisation_name: String,
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

/// A user as the API shows it: no password hash, no verification token.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role.to_string(),
            email_verified: user.email_verified,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Organisation / seats
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SeatChangeBody {
    pub requested_seats: u32,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeatRequestQuery {
    pub status: Option<SeatRequestStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionBody {
    #[serde(default)]
    pub note: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference data
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ContractTypeBody {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocalAuthorityBody {
    pub name: String,
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncludeInactiveQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Contracts / rates / payments
// ─────────────────────────────────────────────────────────────────────────────

/// Ten years; wider windows are rejected.
pub const MAX_EXPIRY_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Default, Deserialize)]
pub struct ContractListQuery {
    pub status: Option<ContractStatus>,
    /// Only live contracts ending within this many days.
    pub expiring_within: Option<i64>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewRateRequest {
    pub contract_type_id: ContractTypeId,
    pub local_authority_id: LocalAuthorityId,
    pub amount: Money,
    pub unit: RateUnit,
    pub effective_from: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct RateListQuery {
    pub contract_type_id: Option<ContractTypeId>,
    pub local_authority_id: Option<LocalAuthorityId>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentRateQuery {
    pub contract_type_id: ContractTypeId,
    pub local_authority_id: LocalAuthorityId,
    /// Defaults to today.
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub contract_id: ContractId,
    pub person_id: Option<PersonId>,
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub reference: String,
    pub method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentListQuery {
    pub contract_id: Option<ContractId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// People
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentifierBody {
    pub kind: IdentifierKind,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePersonRequest {
    #[serde(flatten)]
    pub details: caretrack_people::PersonDetails,
    #[serde(default)]
    pub identifiers: Vec<IdentifierBody>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tenders
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateTenderRequest {
    #[serde(flatten)]
    pub draft: TenderDraft,
    pub opportunity_id: Option<OpportunityId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TenderListQuery {
    pub status: Option<TenderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: TenderStatus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Teams
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: UserId,
    #[serde(default = "default_team_role")]
    pub role: TeamRole,
}

fn default_team_role() -> TeamRole {
    TeamRole::Member
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub dry_run: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Approvals / assistant
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalListQuery {
    pub status: Option<ApprovalStatus>,
    pub entity_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use caretrack_auth::roles::STAFF;

    #[test]
    fn user_view_hides_secrets() {
        let user = User::register(
            TenantId::new(),
            "Sam@Example.org",
            "Sam",
            STAFF,
            "$argon2id$stub".to_string(),
            Utc::now(),
        )
        .unwrap();
        let json = serde_json::to_value(UserView::from(&user)).unwrap();
        assert_eq!(json["email"], "sam@example.org");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("verification_token").is_none());
    }

    #[test]
    fn person_request_flattens_details() {
        let body: CreatePersonRequest = serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "date_of_birth": "1990-12-10",
            "notes": null,
            "identifiers": [{ "kind": "national_insurance", "value": "ab 12 34 56 c" }]
        }))
        .unwrap();
        assert_eq!(body.details.first_name, "Ada");
        assert_eq!(body.identifiers.len(), 1);
    }

    #[test]
    fn bad_ids_are_rejected() {
        assert!(parse_id::<ContractId>("not-a-uuid").is_err());
        let id = ContractId::new();
        assert_eq!(parse_id::<ContractId>(&id.to_string()).unwrap(), id);
    }
}
