//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.ermdash.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".ermdash.toml";

/// Upper bound for `api.retries`.
pub const MAX_RETRIES: usize = 10;

/// Upper bound for `report.upcoming_window_days` (ten years).
pub const MAX_UPCOMING_WINDOW_DAYS: i64 = 3650;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// API connection settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Session storage settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the resource-management API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Extra attempts for GET requests on network errors and 5xx responses.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    2
}

/// Session storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where the login token and user profile are kept.
    #[serde(default = "default_session_file")]
    pub file: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: default_session_file(),
        }
    }
}

fn default_session_file() -> PathBuf {
    PathBuf::from(".ermdash-session.json")
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Engineers with more available capacity than this are underutilized.
    #[serde(default = "default_underutilized_threshold")]
    pub underutilized_threshold: u32,

    /// How many days ahead an assignment counts as upcoming.
    #[serde(default = "default_upcoming_window_days")]
    pub upcoming_window_days: i64,

    /// Number of recent projects and assignments listed on the dashboard.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            underutilized_threshold: default_underutilized_threshold(),
            upcoming_window_days: default_upcoming_window_days(),
            recent_limit: default_recent_limit(),
        }
    }
}

fn default_underutilized_threshold() -> u32 {
    crate::analysis::DEFAULT_UNDERUTILIZED_THRESHOLD
}

fn default_upcoming_window_days() -> i64 {
    crate::analysis::DEFAULT_UPCOMING_WINDOW_DAYS
}

fn default_recent_limit() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check value ranges that the TOML types alone do not bound.
    pub fn validate(&self) -> Result<()> {
        if self.api.timeout_seconds == 0 {
            bail!("api.timeout_seconds must be at least 1");
        }

        if self.api.retries > MAX_RETRIES {
            bail!("api.retries must be at most {}, got {}", MAX_RETRIES, self.api.retries);
        }

        if !(0..=MAX_UPCOMING_WINDOW_DAYS).contains(&self.report.upcoming_window_days) {
            bail!(
                "report.upcoming_window_days must be between 0 and {}, got {}",
                MAX_UPCOMING_WINDOW_DAYS,
                self.report.upcoming_window_days
            );
        }

        Ok(())
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref api_url) = args.api_url {
            self.api.base_url = api_url.clone();
        }

        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }

        if let Some(ref session_file) = args.session_file {
            self.session.file = session_file.clone();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
