//! Dashboard data loading.
//!
//! Each view issues its fetches concurrently. A failed fetch does not fail
//! the view: its collection is treated as empty and a notice is recorded so
//! the user can retry. Only an authentication failure aborts the view.

use crate::analysis::{self, active_allocation};
use crate::api::{ApiClient, ApiError, EngineerFilters, ProjectFilters};
use crate::config::ReportConfig;
use crate::models::{
    Capacity, CapacityAllocation, EngineerDashboard, EngineerDetails, ManagerDashboard, User, UtilizationReport,
    DEFAULT_MAX_CAPACITY,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Tunables for the derived statistics.
#[derive(Debug, Clone, Copy)]
pub struct DashboardSettings {
    pub underutilized_threshold: u32,
    pub upcoming_window_days: i64,
    pub recent_limit: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for DashboardSettings {
    fn from(config: &ReportConfig) -> Self {
        Self {
            underutilized_threshold: config.underutilized_threshold,
            upcoming_window_days: config.upcoming_window_days,
            recent_limit: config.recent_limit,
        }
    }
}

/// Search criteria shared by the engineer and project queries of the manager view.
#[derive(Debug, Clone, Default)]
pub struct DashboardFilters {
    pub engineers: EngineerFilters,
    pub projects: ProjectFilters,
}

/// Unwrap one fetch result, downgrading failures to a notice.
fn settle<T>(what: &str, result: Result<T, ApiError>, notices: &mut Vec<String>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ApiError::NotAuthenticated) => Err(ApiError::NotAuthenticated.into()),
        Err(e) => {
            warn!("Failed to load {}: {}", what, e);
            notices.push(format!("Failed to load {}: {}. Re-run to retry.", what, e));
            Ok(None)
        }
    }
}

pub async fn load_manager_dashboard(
    client: &ApiClient,
    filters: &DashboardFilters,
    now: DateTime<Utc>,
    settings: DashboardSettings,
) -> Result<ManagerDashboard> {
    info!("Loading manager dashboard");

    let (projects, engineers, assignments) = futures::join!(
        client.projects(&filters.projects),
        client.engineers(&filters.engineers),
        client.assignments(),
    );

    let mut notices = Vec::new();
    let projects = settle("projects", projects, &mut notices)?.unwrap_or_default();
    let engineers = settle("engineers", engineers, &mut notices)?.unwrap_or_default();
    let assignments = settle("assignments", assignments, &mut notices)?.unwrap_or_default();

    debug!(
        "Fetched {} projects, {} engineers, {} assignments",
        projects.len(),
        engineers.len(),
        assignments.len()
    );

    let utilization = analysis::aggregate(&engineers, &assignments, now);
    let utilization_summary = analysis::summarize_utilization(&utilization, settings.underutilized_threshold);

    Ok(ManagerDashboard {
        generated_at: now,
        project_stats: analysis::project_stats(&projects),
        engineer_stats: analysis::engineer_stats(&engineers, &assignments, now),
        assignment_stats: analysis::assignment_stats(&assignments, now, settings.upcoming_window_days),
        utilization,
        utilization_summary,
        recent_projects: projects.into_iter().take(settings.recent_limit).collect(),
        recent_assignments: assignments.into_iter().take(settings.recent_limit).collect(),
        notices,
    })
}

pub async fn load_utilization(
    client: &ApiClient,
    filters: &EngineerFilters,
    now: DateTime<Utc>,
    settings: DashboardSettings,
) -> Result<UtilizationReport> {
    let (engineers, assignments) = futures::join!(client.engineers(filters), client.assignments());

    let mut notices = Vec::new();
    let engineers = settle("engineers", engineers, &mut notices)?.unwrap_or_default();
    let assignments = settle("assignments", assignments, &mut notices)?.unwrap_or_default();

    let rows = analysis::aggregate(&engineers, &assignments, now);
    let summary = analysis::summarize_utilization(&rows, settings.underutilized_threshold);

    Ok(UtilizationReport {
        generated_at: now,
        rows,
        summary,
        notices,
    })
}

/// Load the signed-in engineer's view.
///
/// When the capacity endpoint fails, capacity is derived from the
/// assignments that did load.
pub async fn load_engineer_dashboard(
    client: &ApiClient,
    user: &User,
    now: DateTime<Utc>,
    settings: DashboardSettings,
) -> Result<EngineerDashboard> {
    info!("Loading engineer dashboard for {}", user.name);

    let (capacity, assignments) = futures::join!(
        client.engineer_capacity(&user.id),
        client.engineer_assignments(&user.id),
    );

    let mut notices = Vec::new();
    let assignments = settle("assignments", assignments, &mut notices)?.unwrap_or_default();
    let capacity = match settle("capacity", capacity, &mut notices)? {
        Some(capacity) => capacity,
        None => {
            let max_capacity = user.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY);
            let total_allocated = active_allocation(&assignments, &user.id, now);
            Capacity {
                max_capacity,
                current_allocations: analysis::current_assignments(&assignments, now)
                    .iter()
                    .map(CapacityAllocation::from)
                    .collect(),
                total_allocated,
                available_capacity: i64::from(max_capacity) - i64::from(total_allocated),
            }
        }
    };

    Ok(EngineerDashboard {
        generated_at: now,
        engineer_name: user.name.clone(),
        capacity,
        current_assignments: analysis::current_assignments(&assignments, now),
        upcoming_assignments: analysis::upcoming_assignments(&assignments, now, settings.upcoming_window_days),
        upcoming_window_days: settings.upcoming_window_days,
        notices,
    })
}

/// Load one engineer's profile with their utilization and assignments.
///
/// The profile itself is required; failing to load the assignments only
/// empties them.
pub async fn load_engineer_details(
    client: &ApiClient,
    engineer_id: &str,
    now: DateTime<Utc>,
    settings: DashboardSettings,
) -> Result<EngineerDetails> {
    info!("Loading engineer {}", engineer_id);

    let (engineer, assignments) = futures::join!(
        client.engineer(engineer_id),
        client.engineer_assignments(engineer_id),
    );

    let engineer = engineer?;
    let mut notices = Vec::new();
    let assignments = settle("assignments", assignments, &mut notices)?.unwrap_or_default();

    Ok(EngineerDetails {
        generated_at: now,
        utilization: analysis::utilization_row(&engineer, &assignments, now),
        current_assignments: analysis::current_assignments(&assignments, now),
        upcoming_assignments: analysis::upcoming_assignments(&assignments, now, settings.upcoming_window_days),
        upcoming_window_days: settings.upcoming_window_days,
        engineer,
        notices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::models::{parse_api_date, Role};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENGINEERS: &str = include_str!("../fixtures/engineers.json");
    const ASSIGNMENTS: &str = include_str!("../fixtures/assignments.json");
    const PROJECTS: &str = include_str!("../fixtures/projects.json");

    fn client_for(server: &MockServer) -> ApiClient {
        let config = ApiConfig {
            base_url: server.uri(),
            timeout_seconds: 5,
            retries: 0,
        };
        ApiClient::new(&config, None).unwrap()
    }

    async fn mount_json(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/json"))
            .mount(server)
            .await;
    }

    fn now() -> DateTime<Utc> {
        parse_api_date("2024-04-15").unwrap()
    }

    fn engineer_user() -> User {
        User {
            id: "e1".to_string(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::Engineer,
            skills: Vec::new(),
            seniority: None,
            department: None,
            max_capacity: Some(100),
        }
    }

    #[tokio::test]
    async fn test_manager_dashboard_from_fixtures() {
        let server = MockServer::start().await;
        mount_json(&server, "/engineers", ENGINEERS).await;
        mount_json(&server, "/assignments", ASSIGNMENTS).await;
        mount_json(&server, "/projects", PROJECTS).await;

        let dashboard = load_manager_dashboard(
            &client_for(&server),
            &DashboardFilters::default(),
            now(),
            DashboardSettings::default(),
        )
        .await
        .unwrap();

        assert!(dashboard.notices.is_empty());
        assert_eq!(dashboard.project_stats.total, 3);
        assert_eq!(dashboard.project_stats.active, 2);
        assert_eq!(dashboard.engineer_stats.total, 3);
        assert_eq!(dashboard.engineer_stats.fully_allocated, 1);

        let ada = &dashboard.utilization[0];
        assert_eq!(ada.name, "Ada Lovelace");
        assert_eq!((ada.allocation, ada.available, ada.overallocated), (110, 0, 10));

        let grace = &dashboard.utilization[1];
        assert_eq!((grace.allocation, grace.available, grace.overallocated), (40, 60, 0));

        let linus = &dashboard.utilization[2];
        assert_eq!((linus.allocation, linus.available, linus.overallocated), (0, 50, 0));

        assert_eq!(dashboard.utilization_summary.overallocated, 1);
        assert_eq!(dashboard.utilization_summary.underutilized, 1);
        assert_eq!(dashboard.assignment_stats.upcoming, 1);
    }

    #[tokio::test]
    async fn test_manager_dashboard_tolerates_failed_fetch() {
        let server = MockServer::start().await;
        mount_json(&server, "/engineers", ENGINEERS).await;
        mount_json(&server, "/projects", PROJECTS).await;
        Mock::given(method("GET"))
            .and(path("/assignments"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "db down"})))
            .mount(&server)
            .await;

        let dashboard = load_manager_dashboard(
            &client_for(&server),
            &DashboardFilters::default(),
            now(),
            DashboardSettings::default(),
        )
        .await
        .unwrap();

        assert_eq!(dashboard.notices.len(), 1);
        assert!(dashboard.notices[0].contains("assignments"));
        assert_eq!(dashboard.assignment_stats.total, 0);
        for row in &dashboard.utilization {
            assert_eq!(row.allocation, 0);
            assert_eq!(row.available, row.capacity);
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_aborts_dashboard() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = load_utilization(
            &client_for(&server),
            &EngineerFilters::default(),
            now(),
            DashboardSettings::default(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_engineer_dashboard_derives_capacity_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/engineers/e1/capacity"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/engineers/e1/assignments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"_id": "a1", "engineerId": "e1", "projectId": {"_id": "p1", "name": "Apollo", "status": "active"},
                 "role": "Dev", "allocationPercentage": 60, "startDate": "2024-04-01", "endDate": "2024-04-30"},
                {"_id": "a2", "engineerId": "e1", "projectId": {"_id": "p2", "name": "Gemini", "status": "planning"},
                 "role": "Dev", "allocationPercentage": 30, "startDate": "2024-05-01", "endDate": "2024-06-30"}
            ])))
            .mount(&server)
            .await;

        let dashboard = load_engineer_dashboard(
            &client_for(&server),
            &engineer_user(),
            now(),
            DashboardSettings::default(),
        )
        .await
        .unwrap();

        assert_eq!(dashboard.notices.len(), 1);
        assert_eq!(dashboard.capacity.total_allocated, 60);
        assert_eq!(dashboard.capacity.available_capacity, 40);
        assert_eq!(dashboard.capacity.current_allocations.len(), 1);
        assert_eq!(dashboard.capacity.current_allocations[0].project, "Apollo");
        assert_eq!(dashboard.capacity.current_allocations[0].percentage, 60);
        assert_eq!(dashboard.current_assignments.len(), 1);
        assert_eq!(dashboard.upcoming_assignments.len(), 1);
    }

    #[tokio::test]
    async fn test_engineer_details_from_fixtures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/engineers/e2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "e2", "name": "Grace Hopper", "seniority": "senior", "maxCapacity": 100
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/engineers/e2/assignments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"_id": "a3", "engineerId": "e2", "projectId": "p2", "role": "Data Engineer",
                 "allocationPercentage": 40, "startDate": "2024-03-01", "endDate": "2024-04-15"},
                {"_id": "a5", "engineerId": "e2", "projectId": "p1", "role": "Reviewer",
                 "allocationPercentage": 30, "startDate": "2024-05-01", "endDate": "2024-05-31"}
            ])))
            .mount(&server)
            .await;

        let details = load_engineer_details(&client_for(&server), "e2", now(), DashboardSettings::default())
            .await
            .unwrap();

        assert!(details.notices.is_empty());
        assert_eq!(details.engineer.name, "Grace Hopper");
        assert_eq!(details.utilization.allocation, 40);
        assert_eq!(details.utilization.available, 60);
        assert_eq!(details.current_assignments.len(), 1);
        assert_eq!(details.current_assignments[0].id, "a3");
        assert_eq!(details.upcoming_assignments.len(), 1);
        assert_eq!(details.upcoming_assignments[0].id, "a5");
    }

    #[tokio::test]
    async fn test_engineer_details_require_the_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/engineers/nobody"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Engineer not found"})))
            .mount(&server)
            .await;
        mount_json(&server, "/engineers/nobody/assignments", "[]").await;

        let err = load_engineer_details(&client_for(&server), "nobody", now(), DashboardSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_engineer_details_tolerate_missing_assignments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/engineers/e3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "e3", "name": "Linus", "maxCapacity": 50
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/engineers/e3/assignments"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let details = load_engineer_details(&client_for(&server), "e3", now(), DashboardSettings::default())
            .await
            .unwrap();

        assert_eq!(details.notices.len(), 1);
        assert_eq!(details.utilization.capacity, 50);
        assert_eq!(details.utilization.available, 50);
        assert!(details.current_assignments.is_empty());
    }
}
