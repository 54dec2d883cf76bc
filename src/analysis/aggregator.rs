//! Allocation aggregation and dashboard statistics.
//!
//! Every function here is a pure recomputation over server snapshots and a
//! reference instant. Callers rerun them after each successful fetch.

use crate::models::{
    Assignment, AssignmentStats, Engineer, EngineerStats, Project, ProjectStats, ProjectStatus,
    UtilizationRow, UtilizationSummary,
};
use chrono::{DateTime, Duration, Utc};

/// Rows with more spare capacity than this are reported as underutilized.
pub const DEFAULT_UNDERUTILIZED_THRESHOLD: u32 = 50;

/// Look-ahead used for "upcoming" assignments.
pub const DEFAULT_UPCOMING_WINDOW_DAYS: i64 = 30;

/// Sum of allocation percentages of `engineer_id`'s assignments active at `now`.
pub fn active_allocation(assignments: &[Assignment], engineer_id: &str, now: DateTime<Utc>) -> u32 {
    assignments
        .iter()
        .filter(|a| a.engineer_id.id() == engineer_id && a.is_active_at(now))
        .map(|a| a.allocation_percentage)
        .sum()
}

/// Compute each engineer's utilization at `now`.
///
/// The output follows the order of `engineers`. Allocations are summed
/// without clamping; `available` and `overallocated` are derived
/// independently from the sum and the capacity, so at most one is nonzero.
pub fn aggregate(
    engineers: &[Engineer],
    assignments: &[Assignment],
    now: DateTime<Utc>,
) -> Vec<UtilizationRow> {
    engineers
        .iter()
        .map(|engineer| utilization_row(engineer, assignments, now))
        .collect()
}

/// Utilization of a single engineer at `now`.
pub fn utilization_row(engineer: &Engineer, assignments: &[Assignment], now: DateTime<Utc>) -> UtilizationRow {
    let allocation = active_allocation(assignments, &engineer.id, now);

    UtilizationRow {
        engineer_id: engineer.id.clone(),
        name: engineer.name.clone(),
        capacity: engineer.max_capacity,
        allocation,
        available: engineer.max_capacity.saturating_sub(allocation),
        overallocated: allocation.saturating_sub(engineer.max_capacity),
    }
}

/// Bucket utilization rows into overallocated, underutilized and optimal.
///
/// Overallocation wins over underutilization; the two cannot overlap anyway
/// since `available` is zero whenever `overallocated` is positive.
pub fn summarize_utilization(rows: &[UtilizationRow], underutilized_threshold: u32) -> UtilizationSummary {
    let total = rows.len();
    let overallocated = rows.iter().filter(|r| r.overallocated > 0).count();
    let underutilized = rows
        .iter()
        .filter(|r| r.overallocated == 0 && r.available > underutilized_threshold)
        .count();

    UtilizationSummary {
        total,
        overallocated,
        underutilized,
        optimal: total - overallocated - underutilized,
    }
}

/// Count engineers that still have capacity versus those that are fully allocated.
///
/// An engineer is fully allocated once the active allocation reaches their
/// own capacity; over-allocation counts as fully allocated.
pub fn engineer_stats(engineers: &[Engineer], assignments: &[Assignment], now: DateTime<Utc>) -> EngineerStats {
    let fully_allocated = engineers
        .iter()
        .filter(|e| active_allocation(assignments, &e.id, now) >= e.max_capacity)
        .count();

    EngineerStats {
        total: engineers.len(),
        available: engineers.len() - fully_allocated,
        fully_allocated,
    }
}

/// Whether the assignment starts after `now` but within `window_days`.
///
/// A negative window selects nothing; a window past the representable
/// range of dates is unbounded.
pub fn is_upcoming(assignment: &Assignment, now: DateTime<Utc>, window_days: i64) -> bool {
    if window_days < 0 {
        return false;
    }
    let horizon = Duration::try_days(window_days)
        .and_then(|window| now.checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    assignment.start_date > now && assignment.start_date <= horizon
}

pub fn assignment_stats(assignments: &[Assignment], now: DateTime<Utc>, window_days: i64) -> AssignmentStats {
    AssignmentStats {
        total: assignments.len(),
        current: assignments.iter().filter(|a| a.is_active_at(now)).count(),
        upcoming: assignments
            .iter()
            .filter(|a| is_upcoming(a, now, window_days))
            .count(),
    }
}

pub fn project_stats(projects: &[Project]) -> ProjectStats {
    let count = |status: ProjectStatus| projects.iter().filter(|p| p.status == status).count();

    ProjectStats {
        total: projects.len(),
        active: count(ProjectStatus::Active),
        completed: count(ProjectStatus::Completed),
        planning: count(ProjectStatus::Planning),
    }
}

/// Assignments active at `now`, in input order.
pub fn current_assignments(assignments: &[Assignment], now: DateTime<Utc>) -> Vec<Assignment> {
    assignments
        .iter()
        .filter(|a| a.is_active_at(now))
        .cloned()
        .collect()
}

/// Assignments starting within the next `window_days`, in input order.
pub fn upcoming_assignments(assignments: &[Assignment], now: DateTime<Utc>, window_days: i64) -> Vec<Assignment> {
    assignments
        .iter()
        .filter(|a| is_upcoming(a, now, window_days))
        .cloned()
        .collect()
}

/// Assignments belonging to a single engineer.
pub fn assignments_for_engineer(assignments: &[Assignment], engineer_id: &str) -> Vec<Assignment> {
    assignments
        .iter()
        .filter(|a| a.engineer_id.id() == engineer_id)
        .cloned()
        .collect()
}
