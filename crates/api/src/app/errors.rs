use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use caretrack_auth::{AuthzError, PasswordError, TokenValidationError};
use caretrack_core::DomainError;
use caretrack_infra::jobs::TenderCheckError;
use caretrack_infra::{FeedError, InfraError};
use caretrack_teams::ImportError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Everything a handler can fail with. Rendered as `{ "error", "message" }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code,
            message: message.into(),
        }
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Domain(e) => match e {
                DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                DomainError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
                DomainError::InvariantViolation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation"),
                DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                DomainError::Unauthorized(_) => (StatusCode::FORBIDDEN, "unauthorized"),
            },
            ApiError::Authz(AuthzError::TenantMismatch) => (StatusCode::FORBIDDEN, "tenant_mismatch"),
            ApiError::Authz(AuthzError::Forbidden(_)) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Infra(InfraError::TenantIsolation(_)) => (StatusCode::FORBIDDEN, "tenant_isolation"),
            ApiError::Infra(InfraError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Infra(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        json_error(status, code, self.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort => ApiError::bad_request("weak_password", err.to_string()),
            PasswordError::Hash(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<TokenValidationError> for ApiError {
    fn from(err: TokenValidationError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::bad_request("invalid_import", err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Infra(InfraError::from(err))
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::NotConfigured => ApiError::Unavailable(err.to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<TenderCheckError> for ApiError {
    fn from(err: TenderCheckError) -> Self {
        match err {
            TenderCheckError::Store(e) => ApiError::Infra(e),
            TenderCheckError::Feed(e) => e.into(),
            TenderCheckError::NotConfigured => DomainError::not_found("tender monitoring preference").into(),
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
