//! Client for the resource-management REST API.

pub mod client;
pub mod error;

pub use client::{ApiClient, EngineerFilters, ProjectFilters};
pub use error::ApiError;
