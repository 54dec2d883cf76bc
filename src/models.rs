//! Data models for the resource dashboard.
//!
//! This module contains the wire types returned by the resource-management
//! API (engineers, assignments, projects, users) and the derived report
//! types recomputed from them on every refresh.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default maximum capacity for engineers that do not report one.
pub const DEFAULT_MAX_CAPACITY: u32 = 100;

fn default_max_capacity() -> u32 {
    DEFAULT_MAX_CAPACITY
}

/// Parse an ISO-8601 date as sent by the API.
///
/// Accepts full RFC 3339 timestamps (`2024-03-01T09:30:00.000Z`) and bare
/// calendar dates (`2024-03-01`), the latter interpreted as midnight UTC.
pub fn parse_api_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")?;
    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// Serde adapter for API date fields.
pub mod api_date {
    use super::*;
    use serde::de::Error;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_api_date(&raw).map_err(|e| D::Error::custom(format!("invalid date '{}': {}", raw, e)))
    }
}

/// Seniority tier of an engineer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Junior,
    Mid,
    Senior,
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seniority::Junior => write!(f, "Junior"),
            Seniority::Mid => write!(f, "Mid-Level"),
            Seniority::Senior => write!(f, "Senior"),
        }
    }
}

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Engineer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Manager => write!(f, "manager"),
            Role::Engineer => write!(f, "engineer"),
        }
    }
}

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Planning,
    Active,
    Completed,
}

impl ProjectStatus {
    /// Returns the lowercase wire name, as used in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStatus::Planning => write!(f, "Planning"),
            ProjectStatus::Active => write!(f, "Active"),
            ProjectStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// Minimal view of a referenced document when the API populates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
}

/// Reference to another document: either a bare id or a populated object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(String),
    Populated(EntitySummary),
}

impl EntityRef {
    /// Id of the referenced document, whichever shape was received.
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Id(id) => id,
            EntityRef::Populated(summary) => &summary.id,
        }
    }

    /// Display name, falling back to the id when the reference is not populated.
    pub fn display_name(&self) -> &str {
        match self {
            EntityRef::Id(id) => id,
            EntityRef::Populated(summary) => summary.name.as_deref().unwrap_or(&summary.id),
        }
    }

    /// Project status, when the reference is a populated project.
    pub fn status(&self) -> Option<ProjectStatus> {
        match self {
            EntityRef::Id(_) => None,
            EntityRef::Populated(summary) => summary.status,
        }
    }
}

/// An engineer as returned by `GET /engineers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engineer {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<Seniority>,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

/// An engineer-to-project assignment as returned by `GET /assignments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(rename = "_id")]
    pub id: String,
    pub engineer_id: EntityRef,
    pub project_id: EntityRef,
    #[serde(default)]
    pub role: String,
    pub allocation_percentage: u32,
    #[serde(with = "api_date")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "api_date")]
    pub end_date: DateTime<Utc>,
}

impl Assignment {
    /// Whether the inclusive `[start_date, end_date]` range contains `at`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start_date <= at && at <= self.end_date
    }
}

/// A project as returned by `GET /projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ProjectStatus,
    #[serde(with = "api_date")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "api_date")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub team_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<EntityRef>,
}

/// One member of a project's team, as embedded by `GET /projects/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub engineer: EntityRef,
    #[serde(default)]
    pub role: String,
    pub allocation_percentage: u32,
    #[serde(with = "api_date")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "api_date")]
    pub end_date: DateTime<Utc>,
}

/// A project together with its assigned team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: Project,
    #[serde(default)]
    pub team: Vec<TeamMember>,
}

/// The authenticated user, as returned by `/auth/login` and `/auth/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<Seniority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<u32>,
}

/// One allocation line of an engineer's capacity breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityAllocation {
    pub project: String,
    pub percentage: u32,
    #[serde(with = "api_date")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "api_date")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub role: String,
}

impl From<&Assignment> for CapacityAllocation {
    fn from(assignment: &Assignment) -> Self {
        Self {
            project: assignment.project_id.display_name().to_string(),
            percentage: assignment.allocation_percentage,
            start_date: assignment.start_date,
            end_date: assignment.end_date,
            role: assignment.role.clone(),
        }
    }
}

/// Capacity summary from `GET /engineers/{id}/capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
    #[serde(default)]
    pub current_allocations: Vec<CapacityAllocation>,
    #[serde(default)]
    pub total_allocated: u32,
    #[serde(default)]
    pub available_capacity: i64,
}

impl Default for Capacity {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            current_allocations: Vec::new(),
            total_allocated: 0,
            available_capacity: i64::from(DEFAULT_MAX_CAPACITY),
        }
    }
}

/// Per-engineer utilization at a reference instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationRow {
    pub engineer_id: String,
    pub name: String,
    pub capacity: u32,
    /// Sum of active allocation percentages, unclamped.
    pub allocation: u32,
    pub available: u32,
    pub overallocated: u32,
}

/// Team-level bucketing of utilization rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationSummary {
    pub total: usize,
    pub overallocated: usize,
    pub underutilized: usize,
    pub optimal: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineerStats {
    pub total: usize,
    pub available: usize,
    pub fully_allocated: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentStats {
    pub total: usize,
    pub current: usize,
    pub upcoming: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub planning: usize,
}

/// Everything the manager view shows, recomputed from one data refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerDashboard {
    pub generated_at: DateTime<Utc>,
    pub project_stats: ProjectStats,
    pub engineer_stats: EngineerStats,
    pub assignment_stats: AssignmentStats,
    pub utilization: Vec<UtilizationRow>,
    pub utilization_summary: UtilizationSummary,
    pub recent_projects: Vec<Project>,
    pub recent_assignments: Vec<Assignment>,
    /// Fetch failures that left part of the dashboard empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

/// Team utilization at one reference instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationReport {
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<UtilizationRow>,
    pub summary: UtilizationSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

/// One engineer's profile with their utilization and assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineerDetails {
    pub generated_at: DateTime<Utc>,
    pub engineer: Engineer,
    pub utilization: UtilizationRow,
    pub current_assignments: Vec<Assignment>,
    pub upcoming_assignments: Vec<Assignment>,
    pub upcoming_window_days: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

/// Everything the engineer view shows for the signed-in engineer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineerDashboard {
    pub generated_at: DateTime<Utc>,
    pub engineer_name: String,
    pub capacity: Capacity,
    pub current_assignments: Vec<Assignment>,
    pub upcoming_assignments: Vec<Assignment>,
    pub upcoming_window_days: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}
