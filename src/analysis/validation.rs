//! Form validation for assignments and projects.
//!
//! Validation collects every field error instead of stopping at the first,
//! so a caller can report all of them in one go.

use crate::models::{parse_api_date, Project, ProjectStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Field name to error message, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", join_errors(.errors))]
pub struct FieldErrors {
    errors: BTreeMap<&'static str, String>,
}

impl FieldErrors {
    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.insert(field, message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.errors.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

/// Raw assignment input, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct AssignmentForm {
    pub engineer_id: String,
    pub project_id: String,
    pub role: String,
    pub allocation_percentage: String,
    pub start_date: String,
    pub end_date: String,
}

/// A validated assignment ready to `POST /assignments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub engineer_id: String,
    pub project_id: String,
    pub role: String,
    pub allocation_percentage: u32,
    #[serde(serialize_with = "serialize_date")]
    pub start_date: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub end_date: DateTime<Utc>,
}

/// Raw project input.
#[derive(Debug, Clone)]
pub struct ProjectForm {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub start_date: String,
    pub end_date: String,
    pub required_skills: Vec<String>,
    pub team_size: u32,
}

impl Default for ProjectForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            status: ProjectStatus::Planning,
            start_date: String::new(),
            end_date: String::new(),
            required_skills: Vec::new(),
            team_size: 1,
        }
    }
}

/// A validated project ready to `POST /projects`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    #[serde(serialize_with = "serialize_date")]
    pub start_date: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub end_date: DateTime<Utc>,
    pub required_skills: Vec<String>,
    pub team_size: u32,
}

/// Raw partial project input; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdateForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub required_skills: Option<Vec<String>>,
    pub team_size: Option<u32>,
}

/// A validated partial project ready to `PATCH /projects/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_optional_date")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_optional_date")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_size: Option<u32>,
}

fn serialize_date<S: serde::Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn serialize_optional_date<S: serde::Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(date) => serialize_date(date, serializer),
        None => serializer.serialize_none(),
    }
}

fn require(errors: &mut FieldErrors, field: &'static str, value: &str, message: &str) -> bool {
    if value.trim().is_empty() {
        errors.insert(field, message);
        false
    } else {
        true
    }
}

fn parse_date_field(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &str,
    missing: &str,
) -> Option<DateTime<Utc>> {
    if !require(errors, field, value, missing) {
        return None;
    }
    match parse_api_date(value) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.insert(field, "Invalid date, expected YYYY-MM-DD");
            None
        }
    }
}

/// Validates the start/end pair, reporting an inverted range on the end date.
fn validate_range(
    errors: &mut FieldErrors,
    start: &str,
    end: &str,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_date_field(errors, "startDate", start, "Start date is required");
    let end = parse_date_field(errors, "endDate", end, "End date is required");

    match (start, end) {
        (Some(start), Some(end)) if start > end => {
            errors.insert("endDate", "End date must be after start date");
            None
        }
        (Some(start), Some(end)) => Some((start, end)),
        _ => None,
    }
}

fn parse_allocation(value: &str) -> Option<u32> {
    let parsed: f64 = value.trim().parse().ok()?;
    if parsed.is_finite() && (0.0..=100.0).contains(&parsed) && parsed.fract() == 0.0 {
        Some(parsed as u32)
    } else {
        None
    }
}

/// Trims skills, dropping blanks and repeats while keeping the first spelling.
fn normalize_skills(skills: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for skill in skills.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !normalized.iter().any(|s| s == skill) {
            normalized.push(skill.to_string());
        }
    }
    normalized
}

fn join_errors(errors: &BTreeMap<&'static str, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AssignmentForm {
    pub fn validate(&self) -> Result<NewAssignment, FieldErrors> {
        let mut errors = FieldErrors::default();

        require(&mut errors, "engineerId", &self.engineer_id, "Engineer is required");
        require(&mut errors, "projectId", &self.project_id, "Project is required");
        require(&mut errors, "role", &self.role, "Role is required");
        let range = validate_range(&mut errors, &self.start_date, &self.end_date);

        let allocation = parse_allocation(&self.allocation_percentage);
        if allocation.is_none() {
            errors.insert("allocationPercentage", "Allocation must be between 0 and 100");
        }

        match (range, allocation) {
            (Some((start_date, end_date)), Some(allocation_percentage)) => errors.into_result(|| NewAssignment {
                engineer_id: self.engineer_id.trim().to_string(),
                project_id: self.project_id.trim().to_string(),
                role: self.role.trim().to_string(),
                allocation_percentage,
                start_date,
                end_date,
            }),
            _ => Err(errors),
        }
    }
}

impl ProjectForm {
    pub fn validate(&self) -> Result<NewProject, FieldErrors> {
        let mut errors = FieldErrors::default();

        require(&mut errors, "name", &self.name, "Project name is required");
        require(&mut errors, "description", &self.description, "Description is required");
        let range = validate_range(&mut errors, &self.start_date, &self.end_date);

        if self.team_size < 1 {
            errors.insert("teamSize", "Team size must be at least 1");
        }

        let required_skills = normalize_skills(&self.required_skills);

        match range {
            Some((start_date, end_date)) => errors.into_result(|| NewProject {
                name: self.name.trim().to_string(),
                description: self.description.trim().to_string(),
                status: self.status,
                start_date,
                end_date,
                required_skills,
                team_size: self.team_size,
            }),
            None => Err(errors),
        }
    }
}

impl ProjectUpdateForm {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.required_skills.is_none()
            && self.team_size.is_none()
    }

    /// Validates the changes against the stored project, so that moving only
    /// one end of the timeline still has to keep `start <= end`.
    pub fn validate(&self, current: &Project) -> Result<ProjectUpdate, FieldErrors> {
        let mut errors = FieldErrors::default();

        if self.is_empty() {
            errors.insert("project", "Nothing to update");
            return Err(errors);
        }

        if let Some(name) = &self.name {
            require(&mut errors, "name", name, "Project name is required");
        }
        if let Some(description) = &self.description {
            require(&mut errors, "description", description, "Description is required");
        }
        if self.team_size == Some(0) {
            errors.insert("teamSize", "Team size must be at least 1");
        }

        let start_date = self
            .start_date
            .as_deref()
            .map(|value| parse_date_field(&mut errors, "startDate", value, "Start date is required"));
        let end_date = self
            .end_date
            .as_deref()
            .map(|value| parse_date_field(&mut errors, "endDate", value, "End date is required"));

        // A date that failed to parse already carries its own error.
        if let (Some(None), _) | (_, Some(None)) = (start_date, end_date) {
            return Err(errors);
        }
        let start_date = start_date.flatten();
        let end_date = end_date.flatten();

        if start_date.unwrap_or(current.start_date) > end_date.unwrap_or(current.end_date) {
            let field = if end_date.is_some() { "endDate" } else { "startDate" };
            errors.insert(field, "End date must be after start date");
        }

        errors.into_result(|| ProjectUpdate {
            name: self.name.as_deref().map(|s| s.trim().to_string()),
            description: self.description.as_deref().map(|s| s.trim().to_string()),
            status: self.status,
            start_date,
            end_date,
            required_skills: self.required_skills.as_deref().map(normalize_skills),
            team_size: self.team_size,
        })
    }
}

impl fmt::Display for NewAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} as {} at {}% ({} to {})",
            self.engineer_id,
            self.project_id,
            self.role,
            self.allocation_percentage,
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }
}
