//! HTTP client for the resource-management API.

use crate::analysis::validation::{NewAssignment, NewProject, ProjectUpdate};
use crate::api::error::ApiError;
use crate::config::ApiConfig;
use crate::models::{Assignment, Capacity, Engineer, Project, ProjectDetails, ProjectStatus, Seniority, User};
use crate::session::Session;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Pause before the first retry; doubled for each further attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Longest pause between two attempts.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Delay before retry number `attempt` (zero-based), capped at [`MAX_RETRY_BACKOFF`].
fn retry_delay(attempt: usize) -> Duration {
    u32::try_from(attempt)
        .ok()
        .and_then(|exp| 2u32.checked_pow(exp))
        .and_then(|factor| RETRY_BACKOFF.checked_mul(factor))
        .map_or(MAX_RETRY_BACKOFF, |delay| delay.min(MAX_RETRY_BACKOFF))
}

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Query filters for `GET /engineers`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineerFilters {
    pub search: Option<String>,
    pub skills: Vec<String>,
    pub seniority: Option<Seniority>,
    /// Minimum available capacity, in percent.
    pub availability: Option<u32>,
}

impl EngineerFilters {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(ref search) = self.search {
            query.push(("search", search.clone()));
        }
        if !self.skills.is_empty() {
            query.push(("skills", self.skills.join(",")));
        }
        if let Some(seniority) = self.seniority {
            let value = match seniority {
                Seniority::Junior => "junior",
                Seniority::Mid => "mid",
                Seniority::Senior => "senior",
            };
            query.push(("seniority", value.to_string()));
        }
        if let Some(availability) = self.availability {
            query.push(("availability", availability.to_string()));
        }
        query
    }
}

/// Query filters for `GET /projects`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFilters {
    pub search: Option<String>,
    pub status: Option<ProjectStatus>,
    pub skills: Vec<String>,
}

impl ProjectFilters {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(ref search) = self.search {
            query.push(("search", search.clone()));
        }
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if !self.skills.is_empty() {
            query.push(("skills", self.skills.join(",")));
        }
        query
    }
}

/// API client bound to one base URL and, optionally, one session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    retries: usize,
}

impl ApiClient {
    /// Create a client; requests carry the session token when one is given.
    pub fn new(config: &ApiConfig, session: Option<&Session>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(session) = session {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", session.token))
                    .context("Invalid token format")?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retries: config.retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET with retries on transient failures.
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let mut attempt = 0;
        loop {
            let result = self.get_once(path, query).await;
            match result {
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let delay = retry_delay(attempt);
                    attempt += 1;
                    warn!(
                        "GET {} failed ({}), retrying in {:?} ({}/{})",
                        path, e, delay, attempt, self.retries
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        debug!("GET {} {:?}", path, query);
        let response = self.client.get(self.url(path)).query(query).send().await?;
        Self::handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        debug!("POST {}", path);
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        debug!("PATCH {}", path);
        let response = self.client.patch(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Accepts any success status and ignores the body.
    async fn expect_success(response: reqwest::Response) -> Result<(), ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_response(status.as_u16(), &body))
        }
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
        } else {
            Err(ApiError::from_response(status.as_u16(), &body))
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.post("/auth/login", &LoginRequest { email, password }).await
    }

    /// Best-effort server-side logout.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self.client.post(self.url("/auth/logout")).send().await?;
        Self::expect_success(response).await
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        self.get("/auth/profile", &[]).await
    }

    pub async fn engineers(&self, filters: &EngineerFilters) -> Result<Vec<Engineer>, ApiError> {
        self.get("/engineers", &filters.to_query()).await
    }

    pub async fn engineer(&self, engineer_id: &str) -> Result<Engineer, ApiError> {
        self.get(&format!("/engineers/{}", engineer_id), &[]).await
    }

    pub async fn engineer_capacity(&self, engineer_id: &str) -> Result<Capacity, ApiError> {
        self.get(&format!("/engineers/{}/capacity", engineer_id), &[]).await
    }

    pub async fn engineer_assignments(&self, engineer_id: &str) -> Result<Vec<Assignment>, ApiError> {
        self.get(&format!("/engineers/{}/assignments", engineer_id), &[]).await
    }

    pub async fn assignments(&self) -> Result<Vec<Assignment>, ApiError> {
        self.get("/assignments", &[]).await
    }

    pub async fn create_assignment(&self, assignment: &NewAssignment) -> Result<Assignment, ApiError> {
        self.post("/assignments", assignment).await
    }

    pub async fn projects(&self, filters: &ProjectFilters) -> Result<Vec<Project>, ApiError> {
        self.get("/projects", &filters.to_query()).await
    }

    /// A project with its team populated.
    pub async fn project(&self, project_id: &str) -> Result<ProjectDetails, ApiError> {
        self.get(&format!("/projects/{}", project_id), &[]).await
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project, ApiError> {
        self.post("/projects", project).await
    }

    pub async fn update_project(&self, project_id: &str, update: &ProjectUpdate) -> Result<Project, ApiError> {
        self.patch(&format!("/projects/{}", project_id), update).await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
        let path = format!("/projects/{}", project_id);
        debug!("DELETE {}", path);
        let response = self.client.delete(self.url(&path)).send().await?;
        Self::expect_success(response).await
    }
}
