use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{DomainError, DomainResult, Entity, GlossaryTermId, TenantId, optional_text, required_text};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryDraft {
    pub term: String,
    pub definition: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub id: GlossaryTermId,
    pub tenant_id: TenantId,
    pub term: String,
    pub definition: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for GlossaryTerm {
    type Id = GlossaryTermId;

    fn id(&self) -> &GlossaryTermId {
        &self.id
    }
}

impl GlossaryTerm {
    pub fn create(tenant_id: TenantId, draft: GlossaryDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: GlossaryTermId::new(),
            tenant_id,
            term: required_text("term", &draft.term)?,
            definition: required_text("definition", &draft.definition)?,
            category: optional_text(draft.category),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, draft: GlossaryDraft, now: DateTime<Utc>) -> DomainResult<()> {
        self.term = required_text("term", &draft.term)?;
        self.definition = required_text("definition", &draft.definition)?;
        self.category = optional_text(draft.category);
        self.updated_at = now;
        Ok(())
    }

    fn term_key(&self) -> String {
        self.term.to_lowercase()
    }
}

/// Terms are unique per tenant, ignoring case.
pub fn ensure_unique_term<'a>(
    terms: impl IntoIterator<Item = &'a GlossaryTerm>,
    term: &str,
    except: Option<GlossaryTermId>,
) -> DomainResult<()> {
    let wanted = term.trim().to_lowercase();
    if terms
        .into_iter()
        .any(|t| Some(t.id) != except && t.term_key() == wanted)
    {
        return Err(DomainError::conflict(format!("glossary term '{}' already exists", term.trim())));
    }
    Ok(())
}

/// Terms matching `query` in term, definition or category. Term hits come
/// first; each group is ordered alphabetically. A blank query returns all.
pub fn search<'a>(terms: &'a [GlossaryTerm], query: &str) -> Vec<&'a GlossaryTerm> {
    let q = query.trim().to_lowercase();
    let mut hits: Vec<(bool, &GlossaryTerm)> = terms
        .iter()
        .filter_map(|t| {
            if q.is_empty() {
                return Some((false, t));
            }
            let in_term = t.term_key().contains(&q);
            let elsewhere = t.definition.to_lowercase().contains(&q)
                || t.category.as_deref().is_some_and(|c| c.to_lowercase().contains(&q));
            (in_term || elsewhere).then_some((!in_term, t))
        })
        .collect();
    hits.sort_by(|(a_other, a), (b_other, b)| a_other.cmp(b_other).then_with(|| a.term_key().cmp(&b.term_key())));
    hits.into_iter().map(|(_, t)| t).collect()
}
