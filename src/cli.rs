//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::api::{EngineerFilters, ProjectFilters};
use crate::models::{parse_api_date, ProjectStatus, Seniority};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ermdash - engineering resource management from the terminal
///
/// Sign in to the resource management API, review team utilization and
/// assignments, and create projects and assignments. Markdown/JSON reports.
///
/// Examples:
///   ermdash login --email manager@example.com
///   ermdash dashboard
///   ermdash utilization --skills rust,go --format json
///   ermdash assign --engineer e1 --project p1 --role Developer --allocation 50 \
///       --start 2024-05-01 --end 2024-06-30
///   ermdash project p1
///   ermdash update-project p1 --status completed
///   ermdash --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Base URL of the resource management API
    #[arg(long, value_name = "URL", env = "ERMDASH_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token to use instead of the saved session
    #[arg(long, value_name = "TOKEN", env = "ERMDASH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ermdash.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the session file written by `login`
    #[arg(long, value_name = "FILE", global = true)]
    pub session_file: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT", global = true)]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Reference date for "current" and "upcoming" (YYYY-MM-DD or RFC 3339)
    ///
    /// Defaults to now.
    #[arg(long, value_name = "DATE", global = true)]
    pub now: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Exit with code 2 when any engineer is over-allocated
    ///
    /// Useful for CI pipelines and scheduled checks.
    #[arg(long, global = true)]
    pub fail_on_overallocation: bool,

    /// Generate a default .ermdash.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in and save the session
    Login {
        #[arg(long, env = "ERMDASH_EMAIL")]
        email: String,

        #[arg(long, env = "ERMDASH_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and remove the saved session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show the dashboard for the signed-in user's role
    Dashboard {
        #[command(flatten)]
        engineers: EngineerFilterArgs,

        /// Only count projects with this status
        #[arg(long, value_name = "STATUS")]
        status: Option<StatusFilter>,
    },

    /// Show the team utilization table
    Utilization {
        #[command(flatten)]
        engineers: EngineerFilterArgs,
    },

    /// List engineers
    Engineers {
        #[command(flatten)]
        engineers: EngineerFilterArgs,
    },

    /// Show one engineer's profile, utilization and assignments
    Engineer {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// List assignments (engineers see their own)
    Assignments {
        /// Only show assignments of this engineer (managers)
        #[arg(long, value_name = "ID")]
        engineer: Option<String>,

        /// Only show assignments active at the reference date
        #[arg(long)]
        current: bool,
    },

    /// Assign an engineer to a project
    Assign {
        #[arg(long, value_name = "ID")]
        engineer: String,

        #[arg(long, value_name = "ID")]
        project: String,

        #[arg(long)]
        role: String,

        /// Allocation percentage (0-100)
        #[arg(long, default_value = "100", value_name = "PERCENT")]
        allocation: String,

        #[arg(long, value_name = "DATE")]
        start: String,

        #[arg(long, value_name = "DATE")]
        end: String,
    },

    /// List projects
    Projects {
        #[arg(long)]
        search: Option<String>,

        #[arg(long, value_name = "STATUS")]
        status: Option<StatusFilter>,

        /// Required skills (comma-separated)
        #[arg(long, value_name = "SKILLS", value_delimiter = ',')]
        skills: Vec<String>,
    },

    /// Create a project
    CreateProject {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: String,

        #[arg(long, default_value = "planning", value_name = "STATUS")]
        status: StatusFilter,

        #[arg(long, value_name = "DATE")]
        start: String,

        #[arg(long, value_name = "DATE")]
        end: String,

        /// Required skills (comma-separated)
        #[arg(long, value_name = "SKILLS", value_delimiter = ',')]
        skills: Vec<String>,

        #[arg(long, default_value = "1", value_name = "COUNT")]
        team_size: u32,
    },

    /// Show a project with its team
    Project {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Change some fields of a project
    UpdateProject {
        #[arg(value_name = "ID")]
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_name = "STATUS")]
        status: Option<StatusFilter>,

        #[arg(long, value_name = "DATE")]
        start: Option<String>,

        #[arg(long, value_name = "DATE")]
        end: Option<String>,

        /// Replacement list of required skills (comma-separated)
        #[arg(long, value_name = "SKILLS", value_delimiter = ',')]
        skills: Option<Vec<String>>,

        #[arg(long, value_name = "COUNT")]
        team_size: Option<u32>,
    },

    /// Delete a project
    DeleteProject {
        #[arg(value_name = "ID")]
        id: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Engineer search flags shared by `dashboard` and `utilization`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct EngineerFilterArgs {
    /// Match engineer name or email
    #[arg(long)]
    pub search: Option<String>,

    /// Required skills (comma-separated)
    #[arg(long, value_name = "SKILLS", value_delimiter = ',')]
    pub skills: Vec<String>,

    #[arg(long, value_name = "LEVEL")]
    pub seniority: Option<SeniorityFilter>,

    /// Minimum available capacity in percent
    #[arg(long, value_name = "PERCENT")]
    pub availability: Option<u32>,
}

impl From<&EngineerFilterArgs> for EngineerFilters {
    fn from(args: &EngineerFilterArgs) -> Self {
        Self {
            search: args.search.clone(),
            skills: args.skills.clone(),
            seniority: args.seniority.map(Seniority::from),
            availability: args.availability,
        }
    }
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Project status accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusFilter {
    Planning,
    Active,
    Completed,
}

impl From<StatusFilter> for ProjectStatus {
    fn from(status: StatusFilter) -> Self {
        match status {
            StatusFilter::Planning => ProjectStatus::Planning,
            StatusFilter::Active => ProjectStatus::Active,
            StatusFilter::Completed => ProjectStatus::Completed,
        }
    }
}

/// Seniority accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SeniorityFilter {
    Junior,
    Mid,
    Senior,
}

impl From<SeniorityFilter> for Seniority {
    fn from(level: SeniorityFilter) -> Self {
        match level {
            SeniorityFilter::Junior => Seniority::Junior,
            SeniorityFilter::Mid => Seniority::Mid,
            SeniorityFilter::Senior => Seniority::Senior,
        }
    }
}

impl Command {
    /// Id of the engineer or project the command addresses, if any.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            Command::Engineer { id }
            | Command::Project { id }
            | Command::UpdateProject { id, .. }
            | Command::DeleteProject { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }

    /// Project filters for the commands that query projects.
    pub fn project_filters(&self) -> ProjectFilters {
        match self {
            Command::Dashboard { status, .. } => ProjectFilters {
                status: status.map(ProjectStatus::from),
                ..ProjectFilters::default()
            },
            Command::Projects { search, status, skills } => ProjectFilters {
                search: search.clone(),
                status: status.map(ProjectStatus::from),
                skills: skills.clone(),
            },
            _ => ProjectFilters::default(),
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("A command is required (try --help)".to_string());
        }

        if let Some(ref api_url) = self.api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref now) = self.now {
            if parse_api_date(now).is_err() {
                return Err(format!("Invalid --now date: {}", now));
            }
        }

        if let Some(Command::CreateProject { team_size: 0, .. }) = self.command {
            return Err("Team size must be at least 1".to_string());
        }

        if let Some(id) = self.command.as_ref().and_then(Command::resource_id) {
            if id.trim().is_empty() || id.contains(['/', '?', '#']) {
                return Err(format!("Invalid id: {:?}", id));
            }
        }

        if let Some(Command::DeleteProject { yes: false, .. }) = self.command {
            return Err("Refusing to delete a project without --yes".to_string());
        }

        Ok(())
    }

    /// Reference instant for "current" and "upcoming" computations.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.now
            .as_deref()
            .and_then(|now| parse_api_date(now).ok())
            .unwrap_or_else(Utc::now)
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            command: Some(Command::Whoami),
            api_url: None,
            token: None,
            config: None,
            session_file: None,
            verbose: false,
            quiet: false,
            format: OutputFormat::Markdown,
            output: None,
            now: None,
            timeout: None,
            fail_on_overallocation: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("localhost:5000".to_string());
        assert!(args.validate().is_err());

        args.api_url = Some("https://erm.example.com/api".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_requires_command() {
        let mut args = make_args();
        args.command = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_reference_time() {
        let mut args = make_args();
        args.now = Some("2024-04-15".to_string());
        assert!(args.validate().is_ok());
        assert_eq!(args.reference_time(), parse_api_date("2024-04-15").unwrap());

        args.now = Some("15/04/2024".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_assign_command() {
        let args = Args::try_parse_from([
            "ermdash", "assign", "--engineer", "e1", "--project", "p1", "--role", "Dev",
            "--start", "2024-05-01", "--end", "2024-06-30", "--format", "json",
        ])
        .unwrap();

        assert_eq!(args.format, OutputFormat::Json);
        match args.command {
            Some(Command::Assign { allocation, engineer, .. }) => {
                assert_eq!(allocation, "100");
                assert_eq!(engineer, "e1");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_filters_from_flags() {
        let args = Args::try_parse_from([
            "ermdash", "dashboard", "--skills", "rust,go", "--seniority", "senior", "--status", "active",
        ])
        .unwrap();
        let command = args.command.unwrap();

        let projects = command.project_filters();
        assert_eq!(projects.status, Some(ProjectStatus::Active));

        let Command::Dashboard { engineers, .. } = command else {
            panic!("expected dashboard");
        };
        let filters = EngineerFilters::from(&engineers);
        assert_eq!(filters.skills, vec!["rust", "go"]);
        assert_eq!(filters.seniority, Some(Seniority::Senior));
    }

    #[test]
    fn test_parse_update_project() {
        let args = Args::try_parse_from([
            "ermdash", "update-project", "p1", "--status", "completed", "--skills", "rust,sql",
        ])
        .unwrap();
        assert!(args.validate().is_ok());

        match args.command {
            Some(Command::UpdateProject { id, status, skills, name, team_size, .. }) => {
                assert_eq!(id, "p1");
                assert_eq!(status, Some(StatusFilter::Completed));
                assert_eq!(skills, Some(vec!["rust".to_string(), "sql".to_string()]));
                assert!(name.is_none());
                assert!(team_size.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_delete_project_requires_confirmation() {
        let args = Args::try_parse_from(["ermdash", "delete-project", "p1"]).unwrap();
        assert!(args.validate().is_err());

        let args = Args::try_parse_from(["ermdash", "delete-project", "p1", "--yes"]).unwrap();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_resource_ids_cannot_escape_the_path() {
        let mut args = make_args();
        for bad in ["", " ", "p1/team", "e1?x=1", "p1#frag"] {
            args.command = Some(Command::Project { id: bad.to_string() });
            assert!(args.validate().is_err(), "accepted {:?}", bad);
        }

        args.command = Some(Command::Engineer { id: "64b0f1c2e4".to_string() });
        assert!(args.validate().is_ok());
    }
}
