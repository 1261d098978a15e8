use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caretrack_core::{DomainError, DomainResult, Entity, TeamId, TenantId, optional_text, required_text};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDetails {
    pub name: String,
    pub description: Option<String>,
    pub parent_team_id: Option<TeamId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub parent_team_id: Option<TeamId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Team {
    type Id = TeamId;

    fn id(&self) -> &TeamId {
        &self.id
    }
}

impl Team {
    pub fn create(tenant_id: TenantId, details: TeamDetails, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: TeamId::new(),
            tenant_id,
            name: required_text("team name", &details.name)?,
            description: optional_text(details.description),
            parent_team_id: details.parent_team_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, details: TeamDetails, now: DateTime<Utc>) -> DomainResult<()> {
        if details.parent_team_id == Some(self.id) {
            return Err(DomainError::validation("a team cannot be its own parent"));
        }
        self.name = required_text("team name", &details.name)?;
        self.description = optional_text(details.description);
        self.parent_team_id = details.parent_team_id;
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::invariant("team is already inactive"));
        }
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }
}

/// Reject a name clash with another active team (case-insensitive).
pub fn ensure_unique_team_name<'a>(
    teams: impl IntoIterator<Item = &'a Team>,
    name: &str,
    except: Option<TeamId>,
) -> DomainResult<()> {
    let wanted = name.trim().to_lowercase();
    let clash = teams
        .into_iter()
        .any(|t| t.is_active && Some(t.id) != except && t.name.to_lowercase() == wanted);
    if clash {
        return Err(DomainError::conflict(format!("team '{}' already exists", name.trim())));
    }
    Ok(())
}

/// Reject `new_parent` when it is `team_id` itself or one of its descendants.
pub fn ensure_no_cycle<'a>(
    teams: impl IntoIterator<Item = &'a Team>,
    team_id: TeamId,
    new_parent: Option<TeamId>,
) -> DomainResult<()> {
    let parents: HashMap<TeamId, Option<TeamId>> =
        teams.into_iter().map(|t| (t.id, t.parent_team_id)).collect();

    let mut cursor = new_parent;
    let mut steps = 0usize;
    while let Some(current) = cursor {
        if current == team_id {
            return Err(DomainError::invariant("team hierarchy would contain a cycle"));
        }
        steps += 1;
        if steps > parents.len() {
            // Existing data already loops; refuse to extend it.
            return Err(DomainError::invariant("team hierarchy already contains a cycle"));
        }
        cursor = parents.get(&current).copied().flatten();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(tenant: TenantId, name: &str, parent: Option<TeamId>) -> Team {
        Team::create(
            tenant,
            TeamDetails {
                name: name.into(),
                description: None,
                parent_team_id: parent,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn names_are_unique_case_insensitively() {
        let t = TenantId::new();
        let north = team(t, "North", None);
        assert!(ensure_unique_team_name([&north], " north ", None).is_err());
        assert!(ensure_unique_team_name([&north], "North", Some(north.id)).is_ok());
        assert!(ensure_unique_team_name([&north], "South", None).is_ok());
    }

    #[test]
    fn cycles_are_rejected() {
        let t = TenantId::new();
        let root = team(t, "Root", None);
        let child = team(t, "Child", Some(root.id));
        let grandchild = team(t, "Grandchild", Some(child.id));
        let all = [root.clone(), child.clone(), grandchild.clone()];

        assert!(ensure_no_cycle(&all, root.id, Some(grandchild.id)).is_err());
        assert!(ensure_no_cycle(&all, root.id, Some(root.id)).is_err());
        assert!(ensure_no_cycle(&all, grandchild.id, Some(root.id)).is_ok());
        assert!(ensure_no_cycle(&all, child.id, None).is_ok());
    }

    #[test]
    fn team_cannot_parent_itself() {
        let mut t = team(TenantId::new(), "Solo", None);
        let details = TeamDetails {
            name: "Solo".into(),
            description: None,
            parent_team_id: Some(t.id),
        };
        assert!(t.update(details, Utc::now()).is_err());
    }
}

#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    fn chain(len: usize) -> Vec<Team> {
        let tenant = TenantId::new();
        let mut teams: Vec<Team> = Vec::with_capacity(len);
        for i in 0..len {
            let parent = teams.last().map(|t| t.id);
            let details = TeamDetails { name: format!("Team {i}"), description: None, parent_team_id: parent };
            teams.push(Team::create(tenant, details, Utc::now()).unwrap());
        }
        teams
    }

    proptest! {
        #[test]
        fn a_team_never_moves_under_its_own_descendant(len in 2usize..12, pick in any::<prop::sample::Index>()) {
            let teams = chain(len);
            let descendant = &teams[1 + pick.index(len - 1)];
            prop_assert!(ensure_no_cycle(&teams, teams[0].id, Some(descendant.id)).is_err());
            prop_assert!(ensure_no_cycle(&teams, descendant.id, Some(teams[0].id)).is_ok());
        }
    }
}
