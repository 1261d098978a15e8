use axum::{Router, routing::get};

pub mod admin;
pub mod approvals;
pub mod assistant;
pub mod audit;
pub mod auth;
pub mod contracts;
pub mod glossary;
pub mod organisation;
pub mod payments;
pub mod people;
pub mod rates;
pub mod rbac;
pub mod reference;
pub mod system;
pub mod teams;
pub mod tenders;
pub mod users;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/organisation", organisation::router())
        .nest("/users", users::router())
        .nest("/contract-types", reference::contract_types_router())
        .nest("/local-authorities", reference::local_authorities_router())
        .nest("/contracts", contracts::router())
        .nest("/rates", rates::router())
        .nest("/people", people::router())
        .nest("/payments", payments::router())
        .nest("/tenders", tenders::router())
        .nest("/teams", teams::router())
        .nest("/approvals", approvals::router())
        .nest("/audit", audit::router())
        .nest("/glossary", glossary::router())
        .nest("/assistant", assistant::router())
        .nest("/admin", admin::router())
}
