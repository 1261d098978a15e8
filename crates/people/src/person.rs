use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{DomainError, DomainResult, Entity, PersonId, TenantId, optional_text, required_text};

use crate::{IdentifierKind, PersonIdentifier, identifier::normalise_value};

/// Editable personal details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDetails {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub notes: Option<String>,
    pub identifiers: Vec<PersonIdentifier>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Person {
    type Id = PersonId;

    fn id(&self) -> &PersonId {
        &self.id
    }
}

impl Person {
    pub fn create(tenant_id: TenantId, details: PersonDetails, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut person = Self {
            id: PersonId::new(),
            tenant_id,
            first_name: String::new(),
            last_name: String::new(),
            date_of_birth: None,
            notes: None,
            identifiers: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        person.update(details, now)?;
        Ok(person)
    }

    pub fn update(&mut self, details: PersonDetails, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(dob) = details.date_of_birth {
            if dob > now.date_naive() {
                return Err(DomainError::validation("date of birth cannot be in the future"));
            }
        }
        self.first_name = required_text("first name", &details.first_name)?;
        self.last_name = required_text("last name", &details.last_name)?;
        self.date_of_birth = details.date_of_birth;
        self.notes = optional_text(details.notes);
        self.updated_at = now;
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Attach an identifier; a person holds at most one of each kind.
    pub fn add_identifier(&mut self, identifier: PersonIdentifier, now: DateTime<Utc>) -> DomainResult<()> {
        if self.identifiers.iter().any(|i| i.kind == identifier.kind) {
            return Err(DomainError::conflict(format!(
                "person already has a {}",
                identifier.kind.label()
            )));
        }
        self.identifiers.push(identifier);
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_identifier(&mut self, kind: IdentifierKind, value: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let before = self.identifiers.len();
        let wanted = normalise_value(value);
        self.identifiers.retain(|i| !(i.kind == kind && i.value == wanted));
        if self.identifiers.len() == before {
            return Err(DomainError::not_found("identifier"));
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::invariant("person has already been removed"));
        }
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    /// Case-insensitive match on name or any identifier value.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        self.full_name().to_lowercase().contains(&q)
            || self.identifiers.iter().any(|i| i.value.to_lowercase().contains(&q))
    }
}

/// Reject an identifier already held by another active person in the tenant.
pub fn ensure_identifier_unique<'a>(
    people: impl IntoIterator<Item = &'a Person>,
    identifier: &PersonIdentifier,
    except: PersonId,
) -> DomainResult<()> {
    let clash = people
        .into_iter()
        .filter(|p| p.is_active && p.id != except)
        .any(|p| p.identifiers.contains(identifier));
    if clash {
        return Err(DomainError::conflict(format!(
            "{} {} is already recorded for another person",
            identifier.kind.label(),
            identifier.value
        )));
    }
    Ok(())
}
