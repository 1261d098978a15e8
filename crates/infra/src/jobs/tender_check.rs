use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use caretrack_core::TenantId;
use caretrack_organisations::Organisation;
use caretrack_tenders::{TenderMonitoringPreference, TenderOpportunity, select_new};

use crate::audit::AuditEntry;
use crate::error::InfraError;
use crate::mailer::{Email, Mailer};
use crate::store::{DocumentStore, Record, Records, WriteBatch};
use crate::tender_feed::{FeedError, FeedQuery, TenderFeed};

#[derive(Debug, Error)]
pub enum TenderCheckError {
    #[error(transparent)]
    Store(#[from] InfraError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("tender monitoring is not configured for this organisation")]
    NotConfigured,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganisationCheck {
    pub tenant_id: TenantId,
    pub new_opportunities: Vec<TenderOpportunity>,
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckFailure {
    pub tenant_id: TenantId,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TenderCheckReport {
    pub organisations_checked: usize,
    pub new_opportunities: usize,
    pub emails_sent: usize,
    pub failures: Vec<CheckFailure>,
}

/// Polls the tender feed for organisations with monitoring switched on and
/// stores what is new to them.
#[derive(Clone)]
pub struct TenderCheck {
    store: Arc<dyn DocumentStore>,
    feed: Arc<dyn TenderFeed>,
    mailer: Arc<dyn Mailer>,
}

fn digest(opportunities: &[TenderOpportunity]) -> (String, String) {
    let subject = if opportunities.len() == 1 {
        "1 new tender opportunity".to_string()
    } else {
        format!("{} new tender opportunities", opportunities.len())
    };
    let lines: Vec<String> = opportunities
        .iter()
        .map(|o| {
            let mut line = format!("- {} ({})", o.title, o.buyer);
            if let Some(value) = o.value {
                line.push_str(&format!(", value {value}"));
            }
            if let Some(deadline) = o.deadline {
                line.push_str(&format!(", deadline {deadline}"));
            }
            if let Some(url) = &o.url {
                line.push_str(&format!("\n  {url}"));
            }
            line
        })
        .collect();
    (subject, format!("New opportunities matching your monitoring settings:\n\n{}\n", lines.join("\n")))
}

impl TenderCheck {
    pub fn new(store: Arc<dyn DocumentStore>, feed: Arc<dyn TenderFeed>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, feed, mailer }
    }

    pub async fn run_for(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<OrganisationCheck, TenderCheckError> {
        let preferences = Records::<TenderMonitoringPreference>::new(self.store.clone());
        let before = preferences
            .list_active(tenant_id)
            .await?
            .into_iter()
            .next()
            .ok_or(TenderCheckError::NotConfigured)?;

        // Dismissed opportunities still count as seen.
        let existing = Records::<TenderOpportunity>::new(self.store.clone()).list(tenant_id).await?;
        let notices = self
            .feed
            .fetch(&FeedQuery {
                keywords: before.keywords.clone(),
                published_after: before.last_checked_at,
            })
            .await?;

        let fresh: Vec<TenderOpportunity> = select_new(&existing, notices, &before)
            .into_iter()
            .map(|n| TenderOpportunity::from_notice(tenant_id, n, now))
            .collect();

        let mut preference = before.clone();
        preference.mark_checked(now);

        let mut batch = WriteBatch::new();
        for opportunity in &fresh {
            batch.put(opportunity)?;
        }
        batch.put(&preference)?;
        let mut audit = AuditEntry::record(
            tenant_id,
            None,
            "tender_check",
            TenderMonitoringPreference::TABLE,
            preference.uuid(),
            Some(&before),
            Some(&preference),
            now,
        )?;
        audit.changes["new_opportunities"] = json!(fresh.len());
        batch.put(&audit)?;
        self.store.write_batch(batch).await?;

        tracing::info!(tenant_id = %tenant_id, new = fresh.len(), "tender check complete");

        let mut notified = false;
        if let (false, Some(to)) = (fresh.is_empty(), preference.notify_email.as_deref()) {
            let (subject, body) = digest(&fresh);
            match self.mailer.send(Email { to: to.to_string(), subject, body }).await {
                Ok(()) => notified = true,
                Err(err) => tracing::warn!(tenant_id = %tenant_id, error = %err, "tender digest not sent"),
            }
        }

        Ok(OrganisationCheck {
            tenant_id,
            new_opportunities: fresh,
            notified,
        })
    }

    /// Check every active organisation that has monitoring switched on. One
    /// organisation failing does not stop the others.
    pub async fn run_all(&self, now: DateTime<Utc>) -> Result<TenderCheckReport, InfraError> {
        let organisations = Records::<Organisation>::new(self.store.clone()).list_all().await?;
        let monitored: Vec<TenantId> = Records::<TenderMonitoringPreference>::new(self.store.clone())
            .list_all()
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .map(|p| p.tenant_id)
            .collect();

        let mut report = TenderCheckReport::default();
        for org in organisations.iter().filter(|o| o.is_active && monitored.contains(&o.id)) {
            report.organisations_checked += 1;
            match self.run_for(org.id, now).await {
                Ok(check) => {
                    report.new_opportunities += check.new_opportunities.len();
                    report.emails_sent += usize::from(check.notified);
                }
                Err(err) => {
                    tracing::error!(tenant_id = %org.id, error = %err, "tender check failed");
                    report.failures.push(CheckFailure {
                        tenant_id: org.id,
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}
