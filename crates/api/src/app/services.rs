//! Service wiring for the HTTP layer.
//!
//! Handlers receive an `Arc<AppServices>` and reach the store through typed
//! [`Records`] views. Multi-record changes go through one [`WriteBatch`] so
//! they land atomically.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use caretrack_auth::{Hs256JwtValidator, JwtClaims, JwtValidator, Role, TokenValidationError, issue_token};
use caretrack_core::{DomainError, TenantId, UserId};
use caretrack_infra::jobs::TenderCheck;
use caretrack_infra::{
    AppConfig, AuditEntry, DisabledTenderFeed, DocumentStore, Email, HttpTenderFeed, InMemoryDocumentStore,
    InfraError, LogMailer, Mailer, PostgresDocumentStore, Record, Records, SmtpMailer, TenderFeed, WriteBatch,
};
use caretrack_teams::{TeamMember, manager_level_of};

use crate::app::errors::{ApiError, ApiResult};

const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";

pub struct AppServices {
    store: Arc<dyn DocumentStore>,
    mailer: Arc<dyn Mailer>,
    tender_check: TenderCheck,
    jwt: Arc<dyn JwtValidator>,
    jwt_secret: String,
    token_ttl: Duration,
    public_base_url: String,
    superadmin_emails: Vec<String>,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        mailer: Arc<dyn Mailer>,
        feed: Arc<dyn TenderFeed>,
        jwt_secret: impl Into<String>,
        token_ttl: Duration,
        public_base_url: impl Into<String>,
    ) -> Self {
        let jwt_secret = jwt_secret.into();
        Self {
            tender_check: TenderCheck::new(store.clone(), feed, mailer.clone()),
            jwt: Arc::new(Hs256JwtValidator::new(jwt_secret.as_bytes())),
            store,
            mailer,
            jwt_secret,
            token_ttl,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            superadmin_emails: Vec::new(),
        }
    }

    /// Accounts with these emails are given the `superadmin` role when they
    /// register or next sign in.
    pub fn with_superadmin_emails(mut self, emails: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.superadmin_emails = emails.into_iter().map(|e| e.into().trim().to_lowercase()).collect();
        self
    }

    pub fn is_superadmin_email(&self, email: &str) -> bool {
        self.superadmin_emails.iter().any(|e| e == email)
    }

    /// In-memory store with the given mailer and feed; used by tests and
    /// local runs without a database.
    pub fn in_memory(jwt_secret: impl Into<String>, mailer: Arc<dyn Mailer>, feed: Arc<dyn TenderFeed>) -> Self {
        Self::new(
            Arc::new(InMemoryDocumentStore::new()),
            mailer,
            feed,
            jwt_secret,
            Duration::minutes(60),
            DEFAULT_PUBLIC_BASE_URL,
        )
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, InfraError> {
        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => Arc::new(PostgresDocumentStore::connect(url).await?),
            None => {
                tracing::warn!("DATABASE_URL is not set; records are kept in memory only");
                Arc::new(InMemoryDocumentStore::new())
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp).map_err(|e| InfraError::Config(e.to_string()))?),
            None => {
                tracing::info!("SMTP is not configured; outbound mail is logged");
                Arc::new(LogMailer::new())
            }
        };

        let feed: Arc<dyn TenderFeed> = match &config.tender_feed_url {
            Some(url) => Arc::new(HttpTenderFeed::new(url.clone()).map_err(|e| InfraError::Config(e.to_string()))?),
            None => Arc::new(DisabledTenderFeed),
        };

        if !config.superadmin_emails.is_empty() {
            tracing::info!(count = config.superadmin_emails.len(), "superadmin accounts configured");
        }
        Ok(Self::new(
            store,
            mailer,
            feed,
            config.jwt_secret.clone(),
            config.token_ttl,
            config.public_base_url.clone(),
        )
        .with_superadmin_emails(config.superadmin_emails.iter().cloned()))
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn jwt(&self) -> Arc<dyn JwtValidator> {
        self.jwt.clone()
    }

    pub fn tender_check(&self) -> &TenderCheck {
        &self.tender_check
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    pub fn records<R: Record>(&self) -> Records<R> {
        Records::new(self.store.clone())
    }

    /// Load a tenant-scoped record or fail with `not_found`.
    pub async fn require<R: Record>(&self, tenant_id: TenantId, id: R::Id, what: &'static str) -> ApiResult<R> {
        self.records::<R>()
            .get(tenant_id, id)
            .await?
            .ok_or_else(|| ApiError::Domain(DomainError::not_found(what)))
    }

    pub async fn commit(&self, batch: WriteBatch) -> Result<(), InfraError> {
        self.store.write_batch(batch).await
    }

    /// Sign a token for `user_id` acting in `tenant_id`.
    pub fn issue_token(
        &self,
        sub: UserId,
        tenant_id: TenantId,
        roles: Vec<Role>,
        now: DateTime<Utc>,
    ) -> Result<(String, JwtClaims), TokenValidationError> {
        let claims = JwtClaims::new(sub, tenant_id, roles, now, self.token_ttl);
        let token = issue_token(self.jwt_secret.as_bytes(), &claims)?;
        Ok((token, claims))
    }

    /// Send mail without failing the request; delivery problems are logged.
    pub async fn send_mail(&self, email: Email) -> bool {
        let to = email.to.clone();
        match self.mailer.send(email).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, to = %to, "failed to send email");
                false
            }
        }
    }

    /// Highest team manager level `user_id` holds in the tenant.
    pub async fn manager_level(&self, tenant_id: TenantId, user_id: UserId) -> Result<u8, InfraError> {
        let members = self.records::<TeamMember>().list_active(tenant_id).await?;
        Ok(manager_level_of(&members, user_id))
    }
}

/// Append an audit entry for a change to `batch`.
#[allow(clippy::too_many_arguments)]
pub fn audit<T: Serialize>(
    batch: &mut WriteBatch,
    tenant_id: TenantId,
    actor: Option<UserId>,
    action: &str,
    entity_type: &str,
    entity_id: impl Into<Uuid>,
    before: Option<&T>,
    after: Option<&T>,
    at: DateTime<Utc>,
) -> Result<(), InfraError> {
    let entry = AuditEntry::record(tenant_id, actor, action, entity_type, entity_id.into(), before, after, at)?;
    batch.put(&entry)?;
    Ok(())
}
