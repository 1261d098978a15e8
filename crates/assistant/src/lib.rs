//! `caretrack-assistant`
//!
//! A keyword-driven helper over a tenant's portfolio. There is no model
//! behind it: questions are matched against topics and answered from a
//! pre-computed [`PortfolioSummary`] or the tenant's glossary.
//!
//! Nothing in here mutates records; callers load them and pass slices in.

pub mod answer;
pub mod glossary;
pub mod summary;

pub use answer::{Answer, Topic, ask};
pub use glossary::{GlossaryDraft, GlossaryTerm, ensure_unique_term, search};
pub use summary::{EXPIRY_WINDOW_DAYS, ExpiringContract, PortfolioSummary, SummaryInput};
