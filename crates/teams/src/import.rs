//! Bulk team import from CSV or JSON.
//!
//! Parents are referenced by name and resolve against existing active teams
//! or rows earlier in the same file. Duplicate names are skipped, not
//! treated as failures, so re-running an import is harmless.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use caretrack_core::{DomainResult, TeamId, TenantId, optional_text};

use crate::{Team, TeamDetails};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("import file is missing the '{0}' column")]
    MissingColumn(&'static str),

    #[error("malformed CSV: {0}")]
    Csv(String),

    #[error("malformed JSON: {0}")]
    Json(String),

    #[error("import contains no rows")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
}

/// Parse CSV with a header row (`name,description,parent`, any order, any case).
///
/// Returned line numbers are 1-based file lines.
pub fn parse_csv(input: &str) -> Result<Vec<(u64, ImportRow)>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers: csv::StringRecord = reader
        .headers()
        .map_err(|e| ImportError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    if !headers.iter().any(|h| h == "name") {
        return Err(ImportError::MissingColumn("name"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ImportError::Csv(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: ImportRow = record
            .deserialize(Some(&headers))
            .map_err(|e| ImportError::Csv(format!("line {line}: {e}")))?;
        rows.push((line, row));
    }
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(rows)
}

/// Parse a JSON array of rows. Line numbers are 1-based array positions.
pub fn parse_json(input: &str) -> Result<Vec<(u64, ImportRow)>, ImportError> {
    let rows: Vec<ImportRow> = serde_json::from_str(input).map_err(|e| ImportError::Json(e.to_string()))?;
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(rows.into_iter().zip(1u64..).map(|(row, line)| (line, row)).collect())
}

/// Where a planned team's parent comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParentRef {
    Existing(TeamId),
    /// Index into [`ImportPlan::to_create`].
    Planned(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedTeam {
    pub line: u64,
    pub name: String,
    pub description: Option<String>,
    pub parent: Option<ParentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub line: u64,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportPlan {
    pub to_create: Vec<PlannedTeam>,
    pub skipped: Vec<RowIssue>,
    pub errors: Vec<RowIssue>,
}

impl ImportPlan {
    /// Turn the plan into team records, resolving in-file parents to the ids
    /// generated for earlier rows.
    pub fn materialize(&self, tenant_id: TenantId, now: DateTime<Utc>) -> DomainResult<Vec<Team>> {
        let mut created: Vec<Team> = Vec::with_capacity(self.to_create.len());
        for planned in &self.to_create {
            let parent_team_id = match planned.parent {
                Some(ParentRef::Existing(id)) => Some(id),
                Some(ParentRef::Planned(idx)) => created.get(idx).map(|t| t.id),
                None => None,
            };
            created.push(Team::create(
                tenant_id,
                TeamDetails {
                    name: planned.name.clone(),
                    description: planned.description.clone(),
                    parent_team_id,
                },
                now,
            )?);
        }
        Ok(created)
    }
}

/// Resolve names and decide what to create, skip or report.
pub fn plan_import(existing: &[Team], rows: Vec<(u64, ImportRow)>) -> ImportPlan {
    let existing_by_name: HashMap<String, TeamId> = existing
        .iter()
        .filter(|t| t.is_active)
        .map(|t| (t.name.to_lowercase(), t.id))
        .collect();
    let mut planned_by_name: HashMap<String, usize> = HashMap::new();
    let mut plan = ImportPlan::default();

    for (line, row) in rows {
        let name = row.name.trim().to_string();
        let issue = |reason: &str| RowIssue {
            line,
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            plan.errors.push(issue("team name is required"));
            continue;
        }
        let key = name.to_lowercase();
        if existing_by_name.contains_key(&key) {
            plan.skipped.push(issue("a team with this name already exists"));
            continue;
        }
        if planned_by_name.contains_key(&key) {
            plan.skipped.push(issue("duplicate of an earlier row"));
            continue;
        }

        let parent = match optional_text(row.parent) {
            None => None,
            Some(parent_name) => {
                let parent_key = parent_name.to_lowercase();
                if parent_key == key {
                    plan.errors.push(issue("a team cannot be its own parent"));
                    continue;
                }
                match (existing_by_name.get(&parent_key), planned_by_name.get(&parent_key)) {
                    (Some(id), _) => Some(ParentRef::Existing(*id)),
                    (None, Some(idx)) => Some(ParentRef::Planned(*idx)),
                    (None, None) => {
                        plan.errors.push(issue(&format!("unknown parent team '{parent_name}'")));
                        continue;
                    }
                }
            }
        };

        planned_by_name.insert(key, plan.to_create.len());
        plan.to_create.push(PlannedTeam {
            line,
            name,
            description: optional_text(row.description),
            parent,
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing(tenant: TenantId) -> Vec<Team> {
        vec![
            Team::create(
                tenant,
                TeamDetails {
                    name: "Operations".into(),
                    description: None,
                    parent_team_id: None,
                },
                Utc::now(),
            )
            .unwrap(),
        ]
    }

    #[test]
    fn csv_headers_are_case_insensitive_and_fields_optional() {
        let rows = parse_csv("Name,Parent,Description\nNorth,Operations,\nSouth,,Coastal towns\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 2);
        assert_eq!(rows[0].1.name, "North");
        assert_eq!(rows[0].1.parent.as_deref(), Some("Operations"));
        assert_eq!(optional_text(rows[1].1.parent.clone()), None);
        assert_eq!(rows[1].1.description.as_deref(), Some("Coastal towns"));
    }

    #[test]
    fn csv_without_name_column_is_refused() {
        assert_eq!(parse_csv("title\nx\n"), Err(ImportError::MissingColumn("name")));
        assert_eq!(parse_csv("name\n"), Err(ImportError::Empty));
    }

    #[test]
    fn json_rows_are_numbered_from_one() {
        let rows = parse_json(r#"[{"name":"A"},{"name":"B","parent":"A"}]"#).unwrap();
        assert_eq!(rows[1].0, 2);
        assert!(parse_json("{}").is_err());
    }

    #[test]
    fn plan_resolves_parents_and_skips_duplicates() {
        let tenant = TenantId::new();
        let existing = existing(tenant);
        let rows = parse_csv(
            "name,description,parent\n\
             North,,operations\n\
             North East,,North\n\
             OPERATIONS,,\n\
             north,,\n\
             ,orphan,\n\
             West,,Nowhere\n",
        )
        .unwrap();

        let plan = plan_import(&existing, rows);

        assert_eq!(plan.to_create.len(), 2);
        assert_eq!(plan.to_create[0].parent, Some(ParentRef::Existing(existing[0].id)));
        assert_eq!(plan.to_create[1].parent, Some(ParentRef::Planned(0)));
        assert_eq!(plan.skipped.iter().map(|s| s.line).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(plan.errors.iter().map(|s| s.line).collect::<Vec<_>>(), vec![6, 7]);

        let teams = plan.materialize(tenant, Utc::now()).unwrap();
        assert_eq!(teams[1].parent_team_id, Some(teams[0].id));
        assert_eq!(teams[0].parent_team_id, Some(existing[0].id));
    }

    #[test]
    fn forward_parent_references_are_errors() {
        let rows = parse_json(r#"[{"name":"Child","parent":"Later"},{"name":"Later"}]"#).unwrap();
        let plan = plan_import(&[], rows);
        assert_eq!(plan.errors.len(), 1);
        assert_eq!(plan.to_create.len(), 1);
    }
}
