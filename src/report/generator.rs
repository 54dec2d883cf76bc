//! Markdown and JSON report generation.
//!
//! This module renders dashboards and listings as Markdown documents, or
//! serializes them as pretty JSON.

use crate::models::{
    Assignment, AssignmentStats, Engineer, EngineerDashboard, EngineerDetails, EngineerStats, ManagerDashboard,
    Project, ProjectDetails, ProjectStats, UtilizationReport, UtilizationRow, UtilizationSummary,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Emoji marker for a utilization row.
pub fn utilization_marker(row: &UtilizationRow, underutilized_threshold: u32) -> &'static str {
    if row.overallocated > 0 {
        "🔴"
    } else if row.available > underutilized_threshold {
        "🟡"
    } else {
        "🟢"
    }
}

/// Generate the manager dashboard as Markdown.
pub fn generate_manager_markdown(dashboard: &ManagerDashboard, underutilized_threshold: u32) -> String {
    let mut output = String::new();

    output.push_str("# Manager Dashboard\n\n");
    output.push_str(&generate_generated_line(dashboard.generated_at));
    output.push_str(&generate_notices_section(&dashboard.notices));
    output.push_str(&generate_overview_section(
        &dashboard.project_stats,
        &dashboard.engineer_stats,
        &dashboard.assignment_stats,
    ));
    output.push_str(&generate_utilization_section(
        &dashboard.utilization,
        &dashboard.utilization_summary,
        underutilized_threshold,
    ));

    output.push_str("## Recent Projects\n\n");
    if dashboard.recent_projects.is_empty() {
        output.push_str("No projects found.\n\n");
    } else {
        for project in &dashboard.recent_projects {
            output.push_str(&format!("- **{}** (Status: {})\n", project.name, project.status));
        }
        output.push('\n');
    }

    output.push_str("## Recent Assignments\n\n");
    if dashboard.recent_assignments.is_empty() {
        output.push_str("No assignments found.\n\n");
    } else {
        for assignment in &dashboard.recent_assignments {
            output.push_str(&format!(
                "- **{} - {}**: {} ({}%)\n",
                assignment.engineer_id.display_name(),
                assignment.project_id.display_name(),
                assignment.role,
                assignment.allocation_percentage
            ));
        }
        output.push('\n');
    }

    output
}

fn generate_generated_line(at: DateTime<Utc>) -> String {
    format!("*As of {}*\n\n", at.format("%Y-%m-%d %H:%M UTC"))
}

fn generate_notices_section(notices: &[String]) -> String {
    if notices.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    for notice in notices {
        section.push_str(&format!("> ⚠️ {}\n", notice));
    }
    section.push('\n');
    section
}

fn generate_overview_section(
    projects: &ProjectStats,
    engineers: &EngineerStats,
    assignments: &AssignmentStats,
) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str("| Projects | Active | Completed | Planning |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| **{}** | {} | {} | {} |\n\n",
        projects.total, projects.active, projects.completed, projects.planning
    ));

    section.push_str("| Engineers | Available | Fully Allocated |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| **{}** | {} | {} |\n\n",
        engineers.total, engineers.available, engineers.fully_allocated
    ));

    section.push_str(&format!(
        "**Assignments:** {} (Current: {} | Upcoming: {})\n\n",
        assignments.total, assignments.current, assignments.upcoming
    ));

    section
}

fn generate_utilization_section(
    rows: &[UtilizationRow],
    summary: &UtilizationSummary,
    underutilized_threshold: u32,
) -> String {
    let mut section = String::new();

    section.push_str("## Team Utilization\n\n");
    section.push_str(&format!(
        "🔴 Overallocated: {} | 🟢 Optimal: {} | 🟡 Underutilized: {}\n\n",
        summary.overallocated, summary.optimal, summary.underutilized
    ));

    if rows.is_empty() {
        section.push_str("No engineers to show.\n\n");
        return section;
    }

    section.push_str("| | Engineer | Allocated | Available | Overallocated | Capacity |\n");
    section.push_str("|:---:|:---|:---:|:---:|:---:|:---:|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {}% | {}% | {}% | {}% |\n",
            utilization_marker(row, underutilized_threshold),
            row.name,
            row.allocation,
            row.available,
            row.overallocated,
            row.capacity
        ));
    }
    section.push('\n');

    section
}

/// Generate the team utilization report as Markdown.
pub fn generate_utilization_markdown(report: &UtilizationReport, underutilized_threshold: u32) -> String {
    let mut output = String::new();

    output.push_str("# Team Utilization\n\n");
    output.push_str(&generate_generated_line(report.generated_at));
    output.push_str(&generate_notices_section(&report.notices));
    output.push_str(&generate_utilization_section(
        &report.rows,
        &report.summary,
        underutilized_threshold,
    ));

    output
}

/// Generate the engineer dashboard as Markdown.
pub fn generate_engineer_markdown(dashboard: &EngineerDashboard) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Engineer Dashboard: {}\n\n", dashboard.engineer_name));
    output.push_str(&generate_generated_line(dashboard.generated_at));
    output.push_str(&generate_notices_section(&dashboard.notices));

    let capacity = &dashboard.capacity;
    output.push_str("## Current Capacity\n\n");
    output.push_str(&format!(
        "**{}% Allocated** | {}% Available | Max {}%\n\n",
        capacity.total_allocated, capacity.available_capacity, capacity.max_capacity
    ));
    output.push_str(&format!(
        "**{} Active** | {} upcoming in the next {} days\n\n",
        dashboard.current_assignments.len(),
        dashboard.upcoming_assignments.len(),
        dashboard.upcoming_window_days
    ));

    output.push_str("## Current Assignments\n\n");
    if dashboard.current_assignments.is_empty() {
        output.push_str("No current assignments.\n\n");
    } else {
        for assignment in &dashboard.current_assignments {
            output.push_str(&generate_engineer_assignment_line(assignment, false));
        }
        output.push('\n');
    }

    output.push_str("## Upcoming Assignments\n\n");
    if dashboard.upcoming_assignments.is_empty() {
        output.push_str("No upcoming assignments.\n\n");
    } else {
        for assignment in &dashboard.upcoming_assignments {
            output.push_str(&generate_engineer_assignment_line(assignment, true));
        }
        output.push('\n');
    }

    output
}

fn generate_engineer_assignment_line(assignment: &Assignment, upcoming: bool) -> String {
    let detail = if upcoming {
        format!("Starts: {}", assignment.start_date.format("%Y-%m-%d"))
    } else {
        match assignment.project_id.status() {
            Some(status) => format!("Project Status: {}", status),
            None => format!("Ends: {}", assignment.end_date.format("%Y-%m-%d")),
        }
    };

    format!(
        "- **{}**: {} • {}% Allocation ({})\n",
        assignment.project_id.display_name(),
        assignment.role,
        assignment.allocation_percentage,
        detail
    )
}

/// Generate an assignment listing as a Markdown table.
pub fn generate_assignments_markdown(assignments: &[Assignment]) -> String {
    let mut output = String::new();

    output.push_str("# Assignments\n\n");
    if assignments.is_empty() {
        output.push_str("No assignments found.\n");
        return output;
    }

    output.push_str("| Engineer | Project | Role | Allocation | Start | End |\n");
    output.push_str("|:---|:---|:---|:---:|:---:|:---:|\n");
    for a in assignments {
        output.push_str(&format!(
            "| {} | {} | {} | {}% | {} | {} |\n",
            a.engineer_id.display_name(),
            a.project_id.display_name(),
            a.role,
            a.allocation_percentage,
            a.start_date.format("%Y-%m-%d"),
            a.end_date.format("%Y-%m-%d")
        ));
    }
    output.push_str(&format!("\nTotal: {} assignments\n", assignments.len()));

    output
}

/// Generate a project listing as a Markdown table.
pub fn generate_projects_markdown(projects: &[Project]) -> String {
    let mut output = String::new();

    output.push_str("# Projects\n\n");
    if projects.is_empty() {
        output.push_str("No projects found.\n");
        return output;
    }

    output.push_str("| Project | Status | Start | End | Team | Skills |\n");
    output.push_str("|:---|:---:|:---:|:---:|:---:|:---|\n");
    for p in projects {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            p.name,
            p.status,
            p.start_date.format("%Y-%m-%d"),
            p.end_date.format("%Y-%m-%d"),
            p.team_size,
            p.required_skills.join(", ")
        ));
    }
    output.push_str(&format!("\nTotal: {} projects\n", projects.len()));

    output
}

/// Generate an engineer listing as a Markdown table.
pub fn generate_engineers_markdown(engineers: &[Engineer]) -> String {
    let mut output = String::new();

    output.push_str("# Engineers\n\n");
    if engineers.is_empty() {
        output.push_str("No engineers found.\n");
        return output;
    }

    output.push_str("| Engineer | Email | Seniority | Department | Capacity | Skills |\n");
    output.push_str("|:---|:---|:---:|:---|:---:|:---|\n");
    for e in engineers {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {}% | {} |\n",
            e.name,
            e.email.as_deref().unwrap_or("-"),
            e.seniority.map_or_else(|| "-".to_string(), |s| s.to_string()),
            e.department.as_deref().unwrap_or("-"),
            e.max_capacity,
            e.skills.join(", ")
        ));
    }
    output.push_str(&format!("\nTotal: {} engineers\n", engineers.len()));

    output
}

/// Generate one engineer's profile and workload as Markdown.
pub fn generate_engineer_details_markdown(details: &EngineerDetails, underutilized_threshold: u32) -> String {
    let mut output = String::new();
    let engineer = &details.engineer;
    let row = &details.utilization;

    output.push_str(&format!("# Engineer: {}\n\n", engineer.name));
    output.push_str(&generate_generated_line(details.generated_at));
    output.push_str(&generate_notices_section(&details.notices));

    if let Some(ref email) = engineer.email {
        output.push_str(&format!("- **Email:** {}\n", email));
    }
    if let Some(seniority) = engineer.seniority {
        output.push_str(&format!("- **Seniority:** {}\n", seniority));
    }
    if let Some(ref department) = engineer.department {
        output.push_str(&format!("- **Department:** {}\n", department));
    }
    if !engineer.skills.is_empty() {
        output.push_str(&format!("- **Skills:** {}\n", engineer.skills.join(", ")));
    }
    output.push('\n');

    output.push_str("## Capacity\n\n");
    output.push_str(&format!(
        "{} **{}% Allocated** | {}% Available | Max {}%\n\n",
        utilization_marker(row, underutilized_threshold),
        row.allocation,
        row.available,
        row.capacity
    ));
    if row.overallocated > 0 {
        output.push_str(&format!("Over-allocated by {}%.\n\n", row.overallocated));
    }

    output.push_str("## Current Assignments\n\n");
    if details.current_assignments.is_empty() {
        output.push_str("No current assignments.\n\n");
    } else {
        for assignment in &details.current_assignments {
            output.push_str(&generate_engineer_assignment_line(assignment, false));
        }
        output.push('\n');
    }

    output.push_str(&format!("## Upcoming (next {} days)\n\n", details.upcoming_window_days));
    if details.upcoming_assignments.is_empty() {
        output.push_str("No upcoming assignments.\n\n");
    } else {
        for assignment in &details.upcoming_assignments {
            output.push_str(&generate_engineer_assignment_line(assignment, true));
        }
        output.push('\n');
    }

    output
}

/// Generate a project's details and team as Markdown.
pub fn generate_project_details_markdown(details: &ProjectDetails) -> String {
    let mut output = String::new();
    let project = &details.project;

    output.push_str(&format!("# Project: {}\n\n", project.name));
    if !project.description.is_empty() {
        output.push_str(&format!("{}\n\n", project.description));
    }
    output.push_str(&format!("- **Status:** {}\n", project.status));
    output.push_str(&format!(
        "- **Timeline:** {} to {}\n",
        project.start_date.format("%Y-%m-%d"),
        project.end_date.format("%Y-%m-%d")
    ));
    if !project.required_skills.is_empty() {
        output.push_str(&format!("- **Required Skills:** {}\n", project.required_skills.join(", ")));
    }
    if let Some(ref manager) = project.manager_id {
        output.push_str(&format!("- **Manager:** {}\n", manager.display_name()));
    }
    output.push('\n');

    output.push_str(&format!(
        "## Team Members ({}/{})\n\n",
        details.team.len(),
        project.team_size
    ));
    if details.team.is_empty() {
        output.push_str("No team members assigned yet.\n");
        return output;
    }

    for member in &details.team {
        output.push_str(&format!(
            "- **{}**: {} • {}% Allocation ({} to {})\n",
            member.engineer.display_name(),
            member.role,
            member.allocation_percentage,
            member.start_date.format("%Y-%m-%d"),
            member.end_date.format("%Y-%m-%d")
        ));
    }

    output
}

/// Generate a JSON report for any serializable view.
pub fn generate_json_report<T: Serialize + ?Sized>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, summarize_utilization, utilization_row, DEFAULT_UNDERUTILIZED_THRESHOLD};
    use crate::models::{parse_api_date, Capacity, Engineer};

    fn fixture_engineers() -> Vec<Engineer> {
        serde_json::from_str(include_str!("../../fixtures/engineers.json")).unwrap()
    }

    fn fixture_assignments() -> Vec<Assignment> {
        serde_json::from_str(include_str!("../../fixtures/assignments.json")).unwrap()
    }

    fn fixture_projects() -> Vec<Project> {
        serde_json::from_str(include_str!("../../fixtures/projects.json")).unwrap()
    }

    fn utilization_report() -> UtilizationReport {
        let now = parse_api_date("2024-04-15").unwrap();
        let rows = aggregate(&fixture_engineers(), &fixture_assignments(), now);
        let summary = summarize_utilization(&rows, DEFAULT_UNDERUTILIZED_THRESHOLD);
        UtilizationReport {
            generated_at: now,
            rows,
            summary,
            notices: Vec::new(),
        }
    }

    #[test]
    fn test_utilization_markdown() {
        let markdown = generate_utilization_markdown(&utilization_report(), DEFAULT_UNDERUTILIZED_THRESHOLD);

        assert!(markdown.contains("# Team Utilization"));
        assert!(markdown.contains("| 🔴 | Ada Lovelace | 110% | 0% | 10% | 100% |"));
        assert!(markdown.contains("| 🟡 | Grace Hopper | 40% | 60% | 0% | 100% |"));
        assert!(markdown.contains("| 🟢 | Linus Torvalds | 0% | 50% | 0% | 50% |"));
        assert!(markdown.contains("🔴 Overallocated: 1 | 🟢 Optimal: 1 | 🟡 Underutilized: 1"));
    }

    #[test]
    fn test_notices_are_rendered() {
        let mut report = utilization_report();
        report.notices.push("Failed to load assignments: Server error. Re-run to retry.".to_string());

        let markdown = generate_utilization_markdown(&report, DEFAULT_UNDERUTILIZED_THRESHOLD);
        assert!(markdown.contains("> ⚠️ Failed to load assignments"));
    }

    #[test]
    fn test_engineer_markdown() {
        let now = parse_api_date("2024-04-15").unwrap();
        let assignments = fixture_assignments();
        let dashboard = EngineerDashboard {
            generated_at: now,
            engineer_name: "Ada Lovelace".to_string(),
            capacity: Capacity {
                total_allocated: 110,
                available_capacity: -10,
                ..Capacity::default()
            },
            current_assignments: assignments[..2].to_vec(),
            upcoming_assignments: Vec::new(),
            upcoming_window_days: 30,
            notices: Vec::new(),
        };

        let markdown = generate_engineer_markdown(&dashboard);
        assert!(markdown.contains("# Engineer Dashboard: Ada Lovelace"));
        assert!(markdown.contains("**110% Allocated**"));
        assert!(markdown.contains("- **Apollo**: Tech Lead • 60% Allocation (Project Status: Active)"));
        assert!(markdown.contains("No upcoming assignments."));
    }

    #[test]
    fn test_listings() {
        let assignments = generate_assignments_markdown(&fixture_assignments());
        assert!(assignments.contains("| Ada Lovelace | Apollo | Tech Lead | 60% | 2024-01-01 | 2024-12-31 |"));
        assert!(assignments.contains("| e1 | Gemini | Backend Developer | 50% | 2024-04-15 | 2024-06-30 |"));
        assert!(assignments.contains("Total: 5 assignments"));

        let projects = generate_projects_markdown(&fixture_projects());
        assert!(projects.contains("| Apollo | Active | 2024-01-01 | 2024-12-31 | 4 | TypeScript, Rust |"));
        assert!(generate_projects_markdown(&[]).contains("No projects found."));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&utilization_report()).unwrap();

        assert!(json.contains("\"rows\""));
        assert!(json.contains("\"overallocated\": 10"));
        assert!(!json.contains("\"notices\""));
    }

    #[test]
    fn test_engineers_markdown() {
        let markdown = generate_engineers_markdown(&fixture_engineers());
        assert!(markdown.contains("| Linus Torvalds | linus@example.com | Junior | Platform | 50% | C |"));
        assert!(markdown.contains("Total: 3 engineers"));
        assert!(generate_engineers_markdown(&[]).contains("No engineers found."));
    }

    #[test]
    fn test_engineer_details_markdown() {
        let now = parse_api_date("2024-04-15").unwrap();
        let engineers = fixture_engineers();
        let assignments = fixture_assignments();
        let details = EngineerDetails {
            generated_at: now,
            engineer: engineers[0].clone(),
            utilization: utilization_row(&engineers[0], &assignments, now),
            current_assignments: assignments[..2].to_vec(),
            upcoming_assignments: Vec::new(),
            upcoming_window_days: 14,
            notices: Vec::new(),
        };

        let markdown = generate_engineer_details_markdown(&details, DEFAULT_UNDERUTILIZED_THRESHOLD);
        assert!(markdown.contains("# Engineer: Ada Lovelace"));
        assert!(markdown.contains("- **Department:** Platform"));
        assert!(markdown.contains("🔴 **110% Allocated** | 0% Available | Max 100%"));
        assert!(markdown.contains("Over-allocated by 10%."));
        assert!(markdown.contains("## Upcoming (next 14 days)"));
        assert!(markdown.contains("No upcoming assignments."));
    }

    #[test]
    fn test_project_details_markdown() {
        let mut details: ProjectDetails =
            serde_json::from_str(include_str!("../../fixtures/project_details.json")).unwrap();

        let markdown = generate_project_details_markdown(&details);
        assert!(markdown.contains("# Project: Apollo"));
        assert!(markdown.contains("- **Manager:** Margaret Hamilton"));
        assert!(markdown.contains("## Team Members (2/4)"));
        assert!(markdown.contains("- **Ada Lovelace**: Tech Lead • 60% Allocation (2024-01-01 to 2024-12-31)"));
        assert!(markdown.contains("- **e2**: Data Engineer • 40% Allocation (2024-03-01 to 2024-04-15)"));

        details.team.clear();
        let markdown = generate_project_details_markdown(&details);
        assert!(markdown.contains("## Team Members (0/4)"));
        assert!(markdown.contains("No team members assigned yet."));
    }
}
