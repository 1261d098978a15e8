//! Teams, team membership and bulk team import.

pub mod import;
pub mod member;
pub mod team;

pub use import::{
    ImportError, ImportPlan, ImportRow, ParentRef, PlannedTeam, RowIssue, parse_csv, parse_json, plan_import,
};
pub use member::{TeamMember, TeamRole, manager_level_of};
pub use team::{Team, TeamDetails, ensure_no_cycle, ensure_unique_team_name};
