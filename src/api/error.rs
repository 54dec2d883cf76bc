//! Errors returned by the resource-management API.

use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failures talking to the API, classified from status and response body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated. Run `ermdash login` first.")]
    NotAuthenticated,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend refused an assignment because the engineer lacks capacity.
    #[error("{message}")]
    AllocationConflict {
        message: String,
        /// Date to existing allocation percentage on the conflicting days.
        allocations: BTreeMap<String, u32>,
    },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        /// `(field, message)` pairs reported by the backend.
        errors: Vec<(String, String)>,
    },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(e) => !e.is_builder() && !e.is_decode(),
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Build an error from a non-success status and its raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_message(status).to_string());

        match status {
            401 => return ApiError::NotAuthenticated,
            403 => return ApiError::Forbidden(message),
            404 => return ApiError::NotFound(message),
            _ => {}
        }

        if message.to_lowercase().contains("sufficient capacity") {
            return ApiError::AllocationConflict {
                message,
                allocations: parsed.allocations,
            };
        }

        if !parsed.errors.is_empty() {
            return ApiError::Validation {
                message,
                errors: parsed
                    .errors
                    .into_iter()
                    .map(|e| (e.path, e.msg))
                    .collect(),
            };
        }

        ApiError::Api { status, message }
    }

    /// Extra lines worth showing the user after the error itself.
    pub fn hints(&self) -> Vec<String> {
        match self {
            ApiError::NotAuthenticated => {
                vec!["Hint: Your session may have expired. Run `ermdash login`.".to_string()]
            }
            ApiError::Forbidden(_) => {
                vec!["Hint: This operation requires the manager role.".to_string()]
            }
            ApiError::AllocationConflict { allocations, .. } => {
                let mut lines = vec!["Existing allocation on conflicting days:".to_string()];
                lines.extend(
                    allocations
                        .iter()
                        .map(|(date, percent)| format!("  {}: {}%", date, percent)),
                );
                lines
            }
            ApiError::Validation { errors, .. } => errors
                .iter()
                .map(|(field, msg)| format!("  {}: {}", field, msg))
                .collect(),
            ApiError::Network(_) => {
                vec!["Hint: Check that the API is reachable (--api-url or [api] base_url).".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

fn default_message(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        409 => "Conflict",
        422 => "Unprocessable entity",
        500..=599 => "Server error",
        _ => "Unknown error",
    }
}

/// Error body as sent by the backend; every field optional.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<FieldError>,
    #[serde(default)]
    allocations: BTreeMap<String, u32>,
}

#[derive(Debug, Deserialize)]
struct FieldError {
    #[serde(default)]
    path: String,
    #[serde(default)]
    msg: String,
}
