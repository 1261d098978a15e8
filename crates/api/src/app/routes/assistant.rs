//! Portfolio summary and the keyword assistant.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    routing::{get, post},
};
use chrono::Utc;

use caretrack_approvals::ApprovalRequest;
use caretrack_assistant::{GlossaryTerm, PortfolioSummary, SummaryInput, ask};
use caretrack_auth::permissions::ASSISTANT_USE;
use caretrack_contracts::{Contract, Payment, Rate};
use caretrack_core::DomainError;
use caretrack_people::Person;
use caretrack_teams::Team;
use caretrack_tenders::TenderApplication;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::authorize_request;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/summary", get(get_summary))
        .route("/ask", post(ask_question))
}

async fn build_summary(services: &AppServices, tenant: &TenantContext) -> ApiResult<PortfolioSummary> {
    let tenant_id = tenant.tenant_id();
    let contracts = services.records::<Contract>().list_active(tenant_id).await?;
    let people = services.records::<Person>().list_active(tenant_id).await?;
    let payments = services.records::<Payment>().list_active(tenant_id).await?;
    let tenders = services.records::<TenderApplication>().list(tenant_id).await?;
    let approvals = services.records::<ApprovalRequest>().list(tenant_id).await?;
    let teams = services.records::<Team>().list_active(tenant_id).await?;
    let rates = services.records::<Rate>().list(tenant_id).await?;

    Ok(PortfolioSummary::build(
        tenant_id,
        SummaryInput {
            contracts: &contracts,
            people: &people,
            payments: &payments,
            tenders: &tenders,
            approvals: &approvals,
            teams: &teams,
            rates: &rates,
        },
        Utc::now().date_naive(),
    ))
}

/// GET /assistant/summary
pub async fn get_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &ASSISTANT_USE)?;
    let summary = build_summary(&services, &tenant).await?;
    Ok(dto::ok(summary))
}

/// POST /assistant/ask
pub async fn ask_question(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AskRequest>,
) -> ApiResult<axum::response::Response> {
    authorize_request(&tenant, &principal, &ASSISTANT_USE)?;
    if body.question.trim().is_empty() {
        return Err(DomainError::validation("question is required").into());
    }
    let summary = build_summary(&services, &tenant).await?;
    let glossary = services.records::<GlossaryTerm>().list(tenant.tenant_id()).await?;
    let answer = ask(&summary, &glossary, &body.question);

    tracing::debug!(tenant_id = %tenant.tenant_id(), topic = ?answer.topic, "assistant answered");
    Ok(dto::ok(answer))
}
