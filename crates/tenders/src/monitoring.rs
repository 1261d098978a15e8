//! Tender monitoring: which feed notices an organisation wants to see, and
//! which of them are new.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{
    DomainError, DomainResult, Entity, Money, OpportunityId, PreferenceId, TenantId, optional_text,
};

/// Submitted monitoring settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSettings {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    pub min_value: Option<Money>,
    pub max_value: Option<Money>,
    pub notify_email: Option<String>,
    #[serde(default = "enabled")]
    pub is_active: bool,
}

fn enabled() -> bool {
    true
}

/// One organisation's monitoring preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderMonitoringPreference {
    pub id: PreferenceId,
    pub tenant_id: TenantId,
    pub keywords: Vec<String>,
    pub regions: Vec<String>,
    pub min_value: Option<Money>,
    pub max_value: Option<Money>,
    pub notify_email: Option<String>,
    pub is_active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for TenderMonitoringPreference {
    type Id = PreferenceId;

    fn id(&self) -> &PreferenceId {
        &self.id
    }
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

impl TenderMonitoringPreference {
    pub fn new(tenant_id: TenantId, settings: MonitoringSettings, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut pref = Self {
            id: PreferenceId::new(),
            tenant_id,
            keywords: Vec::new(),
            regions: Vec::new(),
            min_value: None,
            max_value: None,
            notify_email: None,
            is_active: true,
            last_checked_at: None,
            updated_at: now,
        };
        pref.apply(settings, now)?;
        Ok(pref)
    }

    pub fn apply(&mut self, settings: MonitoringSettings, now: DateTime<Utc>) -> DomainResult<()> {
        if let (Some(min), Some(max)) = (settings.min_value, settings.max_value) {
            if min > max {
                return Err(DomainError::validation("minimum value is above maximum value"));
            }
        }
        let notify_email = optional_text(settings.notify_email).map(|e| e.to_lowercase());
        if let Some(email) = &notify_email {
            if !email.contains('@') {
                return Err(DomainError::validation(format!("invalid notification email '{email}'")));
            }
        }

        self.keywords = clean_terms(settings.keywords);
        self.regions = clean_terms(settings.regions);
        self.min_value = settings.min_value;
        self.max_value = settings.max_value;
        self.notify_email = notify_email;
        self.is_active = settings.is_active;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_checked(&mut self, now: DateTime<Utc>) {
        self.last_checked_at = Some(now);
    }
}

/// A listing as returned by the external tender feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedNotice {
    #[serde(default)]
    pub source_id: Option<String>,
    pub title: String,
    pub buyer: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub value: Option<Money>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A feed notice stored for an organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderOpportunity {
    pub id: OpportunityId,
    pub tenant_id: TenantId,
    pub dedup_key: String,
    pub source_id: Option<String>,
    pub title: String,
    pub buyer: String,
    pub region: Option<String>,
    pub value: Option<Money>,
    pub deadline: Option<NaiveDate>,
    pub url: Option<String>,
    pub is_active: bool,
    pub discovered_at: DateTime<Utc>,
}

impl Entity for TenderOpportunity {
    type Id = OpportunityId;

    fn id(&self) -> &OpportunityId {
        &self.id
    }
}

impl TenderOpportunity {
    pub fn from_notice(tenant_id: TenantId, notice: FeedNotice, now: DateTime<Utc>) -> Self {
        Self {
            id: OpportunityId::new(),
            tenant_id,
            dedup_key: dedup_key(&notice),
            source_id: optional_text(notice.source_id),
            title: notice.title.trim().to_string(),
            buyer: notice.buyer.trim().to_string(),
            region: optional_text(notice.region),
            value: notice.value,
            deadline: notice.deadline,
            url: optional_text(notice.url),
            is_active: true,
            discovered_at: now,
        }
    }

    pub fn dismiss(&mut self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::invariant("opportunity has already been dismissed"));
        }
        self.is_active = false;
        Ok(())
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Identity of a notice across feed polls: the source id when the feed
/// provides one, otherwise title + buyer + deadline.
pub fn dedup_key(notice: &FeedNotice) -> String {
    match notice.source_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => format!("id:{id}"),
        _ => format!(
            "t:{}|{}|{}",
            normalize(&notice.title),
            normalize(&notice.buyer),
            notice.deadline.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
        ),
    }
}

/// Whether a notice satisfies the preference's keyword, region and value filters.
pub fn matches(pref: &TenderMonitoringPreference, notice: &FeedNotice) -> bool {
    let haystack = format!("{} {}", notice.title, notice.buyer).to_lowercase();
    let keyword_ok = pref.keywords.is_empty() || pref.keywords.iter().any(|k| haystack.contains(k.as_str()));

    let region_ok = pref.regions.is_empty()
        || notice
            .region
            .as_deref()
            .map(|r| r.trim().to_lowercase())
            .is_some_and(|r| pref.regions.contains(&r));

    let value_ok = match notice.value {
        None => true,
        Some(v) => pref.min_value.map_or(true, |min| v >= min) && pref.max_value.map_or(true, |max| v <= max),
    };

    keyword_ok && region_ok && value_ok
}

/// Notices that match `pref` and are neither already stored nor repeated
/// earlier in the same batch. Feed order is preserved.
pub fn select_new<'a>(
    existing: impl IntoIterator<Item = &'a TenderOpportunity>,
    notices: Vec<FeedNotice>,
    pref: &TenderMonitoringPreference,
) -> Vec<FeedNotice> {
    let mut seen: HashSet<String> = existing.into_iter().map(|o| o.dedup_key.clone()).collect();
    notices
        .into_iter()
        .filter(|n| !n.title.trim().is_empty() && matches(pref, n))
        .filter(|n| seen.insert(dedup_key(n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pref(keywords: &[&str], regions: &[&str]) -> TenderMonitoringPreference {
        TenderMonitoringPreference::new(
            TenantId::new(),
            MonitoringSettings {
                keywords: keywords.iter().map(|s| s.to_string()).collect(),
                regions: regions.iter().map(|s| s.to_string()).collect(),
                min_value: Some(Money::from_minor(1_000_000).unwrap()),
                max_value: None,
                notify_email: None,
                is_active: true,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn notice(source: Option<&str>, title: &str, region: Option<&str>, value: Option<i64>) -> FeedNotice {
        FeedNotice {
            source_id: source.map(str::to_string),
            title: title.to_string(),
            buyer: "Kent County Council".to_string(),
            region: region.map(str::to_string),
            value: value.map(|v| Money::from_minor(v).unwrap()),
            deadline: NaiveDate::from_ymd_opt(2026, 12, 1),
            published_at: None,
            url: None,
        }
    }

    #[test]
    fn settings_are_normalised_and_validated() {
        let p = pref(&[" Home Care", "home care", ""], &["South East"]);
        assert_eq!(p.keywords, vec!["home care"]);
        assert_eq!(p.regions, vec!["south east"]);

        let bad = MonitoringSettings {
            min_value: Some(Money::from_minor(10).unwrap()),
            max_value: Some(Money::from_minor(5).unwrap()),
            ..Default::default()
        };
        assert!(TenderMonitoringPreference::new(TenantId::new(), bad, Utc::now()).is_err());
    }

    #[test]
    fn filters_apply_keywords_regions_and_values() {
        let p = pref(&["home care"], &["south east"]);
        assert!(matches(&p, &notice(None, "Home Care Framework", Some("South East"), None)));
        assert!(!matches(&p, &notice(None, "Home Care Framework", Some("North West"), None)));
        assert!(!matches(&p, &notice(None, "Home Care Framework", None, None)));
        assert!(!matches(&p, &notice(None, "Fleet maintenance", Some("South East"), None)));
        assert!(!matches(&p, &notice(None, "Home care lot 2", Some("south east"), Some(5_000))));
        assert!(matches(&p, &notice(None, "Home care lot 2", Some("south east"), Some(5_000_000))));
    }

    #[test]
    fn keys_prefer_source_id() {
        assert_eq!(dedup_key(&notice(Some(" abc-1 "), "x", None, None)), "id:abc-1");
        let a = notice(None, "Home  Care   Framework", None, None);
        let b = notice(Some(""), "home care framework", None, None);
        assert_eq!(dedup_key(&a), dedup_key(&b));
    }

    #[test]
    fn select_new_skips_stored_and_repeated_notices() {
        let p = pref(&[], &[]);
        let tenant = p.tenant_id;
        let stored = TenderOpportunity::from_notice(tenant, notice(Some("1"), "Old listing", None, None), Utc::now());

        let batch = vec![
            notice(Some("1"), "Old listing", None, None),
            notice(Some("2"), "New listing", None, None),
            notice(Some("2"), "New listing (updated)", None, None),
            notice(None, "Untracked listing", None, None),
            notice(None, "untracked   listing", None, None),
            notice(Some("3"), "   ", None, None),
        ];

        let fresh = select_new([&stored], batch, &p);
        let titles: Vec<&str> = fresh.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["New listing", "Untracked listing"]);
    }
}
