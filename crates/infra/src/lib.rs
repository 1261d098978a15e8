//! Infrastructure layer: configuration, persistence, audit, outbound mail and
//! the tender feed.

pub mod audit;
pub mod config;
pub mod error;
pub mod jobs;
pub mod mailer;
pub mod store;
pub mod tender_feed;

pub use audit::{AuditEntry, AuditFilter, diff_json};
pub use config::{AppConfig, SmtpConfig};
pub use error::InfraError;
pub use mailer::{Email, LogMailer, MailError, Mailer, SmtpMailer};
pub use store::{
    DocumentStore, InMemoryDocumentStore, PostgresDocumentStore, Record, Records, WriteBatch, WriteOp,
};
pub use tender_feed::{DisabledTenderFeed, FeedError, FeedQuery, HttpTenderFeed, StaticTenderFeed, TenderFeed};
