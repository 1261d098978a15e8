//! Scheduled jobs. They run from the `tender-check` binary (cron) and can be
//! triggered per organisation through the API.

pub mod tender_check;

pub use tender_check::{CheckFailure, OrganisationCheck, TenderCheck, TenderCheckError, TenderCheckReport};
