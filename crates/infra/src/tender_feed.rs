//! Client for the external tender listing service.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use caretrack_tenders::FeedNotice;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub keywords: Vec<String>,
    pub published_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("tender feed request failed: {0}")]
    Http(String),

    #[error("tender feed returned status {0}")]
    Status(u16),

    #[error("tender feed response could not be read: {0}")]
    Decode(String),

    #[error("no tender feed is configured")]
    NotConfigured,
}

#[async_trait::async_trait]
pub trait TenderFeed: Send + Sync {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<FeedNotice>, FeedError>;
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    notices: Vec<FeedNotice>,
}

/// `GET {url}?keywords=a,b&published_after=<rfc3339>` returning
/// `{ "notices": [...] }`.
pub struct HttpTenderFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpTenderFeed {
    pub fn new(url: impl Into<String>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FeedError::Http(e.to_string()))?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait::async_trait]
impl TenderFeed for HttpTenderFeed {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<FeedNotice>, FeedError> {
        let mut params = vec![("keywords", query.keywords.join(","))];
        if let Some(after) = query.published_after {
            params.push(("published_after", after.to_rfc3339()));
        }

        let response = self
            .client
            .get(&self.url)
            .query(&params)
            .send()
            .await
            .map_err(|e| FeedError::Http(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }
        let body: FeedResponse = response.json().await.map_err(|e| FeedError::Decode(e.to_string()))?;
        tracing::debug!(notices = body.notices.len(), "tender feed fetched");
        Ok(body.notices)
    }
}

/// Serves a fixed list of notices; for tests and local runs without a feed.
#[derive(Debug, Default)]
pub struct StaticTenderFeed {
    notices: Mutex<Vec<FeedNotice>>,
}

impl StaticTenderFeed {
    pub fn new(notices: Vec<FeedNotice>) -> Self {
        Self { notices: Mutex::new(notices) }
    }

    pub fn replace(&self, notices: Vec<FeedNotice>) {
        if let Ok(mut current) = self.notices.lock() {
            *current = notices;
        }
    }
}

#[async_trait::async_trait]
impl TenderFeed for StaticTenderFeed {
    async fn fetch(&self, _query: &FeedQuery) -> Result<Vec<FeedNotice>, FeedError> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .map_err(|_| FeedError::Http("static feed lock poisoned".to_string()))
    }
}

/// Used when `TENDER_FEED_URL` is unset: every check fails with
/// [`FeedError::NotConfigured`].
#[derive(Debug, Default)]
pub struct DisabledTenderFeed;

#[async_trait::async_trait]
impl TenderFeed for DisabledTenderFeed {
    async fn fetch(&self, _query: &FeedQuery) -> Result<Vec<FeedNotice>, FeedError> {
        Err(FeedError::NotConfigured)
    }
}
