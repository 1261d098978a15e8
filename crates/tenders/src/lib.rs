//! Tender applications and tender-feed monitoring.

pub mod application;
pub mod monitoring;

pub use application::{TenderApplication, TenderDraft, TenderStatus};
pub use monitoring::{
    FeedNotice, MonitoringSettings, TenderMonitoringPreference, TenderOpportunity, dedup_key, matches,
    select_new,
};
