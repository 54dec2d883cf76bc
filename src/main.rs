//! ermdash - Engineering Resource Management dashboard client
//!
//! A CLI tool that signs in to the resource management API, recomputes
//! team utilization and dashboard statistics locally, and renders them
//! as Markdown or JSON reports.
//!
//! Exit codes:
//!   0 - Success (no over-allocation, or no --fail-on-overallocation set)
//!   1 - Runtime error (connection, config, authentication, validation, etc.)
//!   2 - Over-allocated engineers found with --fail-on-overallocation

mod analysis;
mod api;
mod cli;
mod config;
mod dashboard;
mod models;
mod report;
mod session;

use analysis::validation::{AssignmentForm, FieldErrors, ProjectForm, ProjectUpdateForm};
use anyhow::{Context, Result};
use api::{ApiClient, ApiError, EngineerFilters};
use cli::{Args, Command, OutputFormat};
use config::Config;
use dashboard::{DashboardFilters, DashboardSettings};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Role, User, UtilizationRow};
use session::{Session, SessionStore};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Configuration is read before logging so `[general] verbose` can apply
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    debug!("ermdash v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", redacted(&args));
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            print_error(&e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .ermdash.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", config::CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to set the API URL, session file and report thresholds.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over --verbose/--quiet when set.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let result = match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish()),
        Err(_) => tracing::subscriber::set_global_default(builder.with_max_level(level).finish()),
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Arguments safe to log: the token is masked.
fn redacted(args: &Args) -> Args {
    let mut args = args.clone();
    if args.token.is_some() {
        args.token = Some("***".to_string());
    }
    if let Some(Command::Login { ref mut password, .. }) = args.command {
        *password = "***".to_string();
    }
    args
}

/// Print an error with any hints the error carries.
fn print_error(err: &anyhow::Error) {
    eprintln!("\n❌ Error: {}", err);

    if let Some(api_err) = err.downcast_ref::<ApiError>() {
        for line in api_err.hints() {
            eprintln!("{}", line);
        }
    } else if let Some(field_errors) = err.downcast_ref::<FieldErrors>() {
        for (field, message) in field_errors.iter() {
            eprintln!("  {}: {}", field, message);
        }
    }
}

/// Run one command. Returns exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let store = SessionStore::new(&config.session.file);
    let session = resolve_session(&args, &store)?;

    let client = ApiClient::new(&config.api, session.as_ref())?;
    let settings = DashboardSettings::from(&config.report);
    let now = args.reference_time();

    let Some(ref command) = args.command else {
        return Ok(0);
    };

    match command {
        Command::Login { email, password } => {
            let auth = client.login(email, password).await?;
            let session = Session::new(auth.token, Some(auth.user));
            store.save(&session)?;
            info!("Session saved to {}", store.path().display());

            if let Some(ref user) = session.user {
                println!("✅ Signed in as {} ({})", user.name, user.role);
            }
            Ok(0)
        }

        Command::Logout => {
            if session.is_some() {
                if let Err(e) = client.logout().await {
                    warn!("Server-side logout failed: {}", e);
                }
            }
            if store.clear()? {
                println!("✅ Signed out.");
            } else {
                println!("No saved session.");
            }
            Ok(0)
        }

        Command::Whoami => {
            require_session(session.as_ref())?;
            let user = client.profile().await?;
            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&user)?,
                OutputFormat::Markdown => format_user(&user),
            };
            write_output(&args, &output)?;
            Ok(0)
        }

        Command::Dashboard { engineers, .. } => {
            let user = current_user(&client, session.as_ref()).await?;

            if user.role == Role::Manager {
                let filters = DashboardFilters {
                    engineers: EngineerFilters::from(engineers),
                    projects: command.project_filters(),
                };
                let pb = spinner(&args, "Loading manager dashboard...");
                let dashboard = dashboard::load_manager_dashboard(&client, &filters, now, settings).await;
                finish(pb);
                let dashboard = dashboard?;

                let output = match args.format {
                    OutputFormat::Json => report::generate_json_report(&dashboard)?,
                    OutputFormat::Markdown => {
                        report::generate_manager_markdown(&dashboard, settings.underutilized_threshold)
                    }
                };
                write_output(&args, &output)?;
                Ok(report_overallocation(&args, &dashboard.utilization))
            } else {
                let pb = spinner(&args, "Loading your dashboard...");
                let dashboard = dashboard::load_engineer_dashboard(&client, &user, now, settings).await;
                finish(pb);
                let dashboard = dashboard?;

                let output = match args.format {
                    OutputFormat::Json => report::generate_json_report(&dashboard)?,
                    OutputFormat::Markdown => report::generate_engineer_markdown(&dashboard),
                };
                write_output(&args, &output)?;
                Ok(0)
            }
        }

        Command::Utilization { engineers } => {
            require_session(session.as_ref())?;
            let pb = spinner(&args, "Loading team utilization...");
            let utilization =
                dashboard::load_utilization(&client, &EngineerFilters::from(engineers), now, settings).await;
            finish(pb);
            let utilization = utilization?;

            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&utilization)?,
                OutputFormat::Markdown => {
                    report::generate_utilization_markdown(&utilization, settings.underutilized_threshold)
                }
            };
            write_output(&args, &output)?;
            Ok(report_overallocation(&args, &utilization.rows))
        }

        Command::Engineers { engineers } => {
            require_session(session.as_ref())?;
            let engineers = client.engineers(&EngineerFilters::from(engineers)).await?;

            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&engineers)?,
                OutputFormat::Markdown => report::generate_engineers_markdown(&engineers),
            };
            write_output(&args, &output)?;
            Ok(0)
        }

        Command::Engineer { id } => {
            require_session(session.as_ref())?;
            let pb = spinner(&args, "Loading engineer...");
            let details = dashboard::load_engineer_details(&client, id, now, settings).await;
            finish(pb);
            let details = details?;

            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&details)?,
                OutputFormat::Markdown => {
                    report::generate_engineer_details_markdown(&details, settings.underutilized_threshold)
                }
            };
            write_output(&args, &output)?;
            Ok(0)
        }

        Command::Assignments { engineer, current } => {
            let user = current_user(&client, session.as_ref()).await?;
            let mut assignments = if user.role == Role::Manager {
                let all = client.assignments().await?;
                match engineer {
                    Some(engineer_id) => analysis::assignments_for_engineer(&all, engineer_id),
                    None => all,
                }
            } else {
                client.engineer_assignments(&user.id).await?
            };
            if *current {
                assignments = analysis::current_assignments(&assignments, now);
            }
            debug!("Listing {} assignments", assignments.len());

            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&assignments)?,
                OutputFormat::Markdown => report::generate_assignments_markdown(&assignments),
            };
            write_output(&args, &output)?;
            Ok(0)
        }

        Command::Assign {
            engineer,
            project,
            role,
            allocation,
            start,
            end,
        } => {
            require_session(session.as_ref())?;
            let form = AssignmentForm {
                engineer_id: engineer.clone(),
                project_id: project.clone(),
                role: role.clone(),
                allocation_percentage: allocation.clone(),
                start_date: start.clone(),
                end_date: end.clone(),
            };
            let new_assignment = form.validate().context("Invalid assignment")?;
            info!("Creating assignment: {}", new_assignment);

            let created = client.create_assignment(&new_assignment).await?;
            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&created)?,
                OutputFormat::Markdown => format!(
                    "✅ Created assignment {}: {} on {} as {} ({}%, {} to {})\n",
                    created.id,
                    created.engineer_id.display_name(),
                    created.project_id.display_name(),
                    created.role,
                    created.allocation_percentage,
                    created.start_date.format("%Y-%m-%d"),
                    created.end_date.format("%Y-%m-%d")
                ),
            };
            write_output(&args, &output)?;
            Ok(0)
        }

        Command::Projects { .. } => {
            require_session(session.as_ref())?;
            let projects = client.projects(&command.project_filters()).await?;

            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&projects)?,
                OutputFormat::Markdown => report::generate_projects_markdown(&projects),
            };
            write_output(&args, &output)?;
            Ok(0)
        }

        Command::CreateProject {
            name,
            description,
            status,
            start,
            end,
            skills,
            team_size,
        } => {
            require_session(session.as_ref())?;
            let form = ProjectForm {
                name: name.clone(),
                description: description.clone(),
                status: (*status).into(),
                start_date: start.clone(),
                end_date: end.clone(),
                required_skills: skills.clone(),
                team_size: *team_size,
            };
            let new_project = form.validate().context("Invalid project")?;
            info!("Creating project: {}", new_project.name);

            let created = client.create_project(&new_project).await?;
            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&created)?,
                OutputFormat::Markdown => format!(
                    "✅ Created project {} ({}): {} to {}\n",
                    created.name,
                    created.id,
                    created.start_date.format("%Y-%m-%d"),
                    created.end_date.format("%Y-%m-%d")
                ),
            };
            write_output(&args, &output)?;
            Ok(0)
        }

        Command::Project { id } => {
            require_session(session.as_ref())?;
            let details = client.project(id).await?;

            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&details)?,
                OutputFormat::Markdown => report::generate_project_details_markdown(&details),
            };
            write_output(&args, &output)?;
            Ok(0)
        }

        Command::UpdateProject {
            id,
            name,
            description,
            status,
            start,
            end,
            skills,
            team_size,
        } => {
            require_session(session.as_ref())?;
            let form = ProjectUpdateForm {
                name: name.clone(),
                description: description.clone(),
                status: status.map(Into::into),
                start_date: start.clone(),
                end_date: end.clone(),
                required_skills: skills.clone(),
                team_size: *team_size,
            };
            let current = client.project(id).await?;
            let update = form.validate(&current.project).context("Invalid project update")?;
            info!("Updating project {}", id);

            let updated = client.update_project(id, &update).await?;
            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&updated)?,
                OutputFormat::Markdown => format!(
                    "✅ Updated project {} ({}): {}, {} to {}\n",
                    updated.name,
                    updated.id,
                    updated.status,
                    updated.start_date.format("%Y-%m-%d"),
                    updated.end_date.format("%Y-%m-%d")
                ),
            };
            write_output(&args, &output)?;
            Ok(0)
        }

        Command::DeleteProject { id, .. } => {
            require_session(session.as_ref())?;
            client.delete_project(id).await?;
            info!("Deleted project {}", id);
            if !args.quiet {
                println!("✅ Deleted project {}.", id);
            }
            Ok(0)
        }
    }
}

/// The session a command runs with: `--token` wins over the saved file.
///
/// `login` and `logout` replace or remove the file, so an unreadable one
/// must not block them.
fn resolve_session(args: &Args, store: &SessionStore) -> Result<Option<Session>> {
    if let Some(ref token) = args.token {
        return Ok(Some(Session::new(token.clone(), None)));
    }

    match args.command {
        Some(Command::Login { .. }) | Some(Command::Logout) => Ok(store.load_or_discard()),
        _ => store.load(),
    }
}

fn require_session(session: Option<&Session>) -> Result<&Session> {
    session.ok_or_else(|| ApiError::NotAuthenticated.into())
}

/// The signed-in user, from the session or, for bare tokens, the profile endpoint.
async fn current_user(client: &ApiClient, session: Option<&Session>) -> Result<User> {
    let session = require_session(session)?;
    match session.user {
        Some(ref user) => Ok(user.clone()),
        None => {
            debug!("Session has no user, fetching profile");
            Ok(client.profile().await?)
        }
    }
}

fn format_user(user: &User) -> String {
    let mut output = format!("{} <{}>\nRole: {}\n", user.name, user.email, user.role);
    if let Some(seniority) = user.seniority {
        output.push_str(&format!("Seniority: {}\n", seniority));
    }
    if let Some(ref department) = user.department {
        output.push_str(&format!("Department: {}\n", department));
    }
    if !user.skills.is_empty() {
        output.push_str(&format!("Skills: {}\n", user.skills.join(", ")));
    }
    output
}

/// Spinner on stderr while data loads; none in quiet mode.
fn spinner(args: &Args, message: &str) -> Option<ProgressBar> {
    if args.quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    match ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        Ok(style) => pb.set_style(style),
        Err(e) => debug!("Invalid spinner template: {}", e),
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn finish(spinner: Option<ProgressBar>) {
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}

/// Write the report to --output, or stdout.
fn write_output(args: &Args, output: &str) -> Result<()> {
    match args.output {
        Some(ref path) => {
            std::fs::write(path, output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Report saved to: {}", path.display());
            }
        }
        None => {
            print!("{}", output);
            if !output.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

/// Exit code 2 when the flag is set and anyone is over capacity, else 0.
fn overallocation_exit_code(fail_on_overallocation: bool, rows: &[UtilizationRow]) -> i32 {
    if fail_on_overallocation && rows.iter().any(|row| row.overallocated > 0) {
        2
    } else {
        0
    }
}

/// Exit code for --fail-on-overallocation, naming the offenders on failure.
fn report_overallocation(args: &Args, rows: &[UtilizationRow]) -> i32 {
    let exit_code = overallocation_exit_code(args.fail_on_overallocation, rows);
    if exit_code != 0 {
        let over: Vec<&str> = rows
            .iter()
            .filter(|row| row.overallocated > 0)
            .map(|row| row.name.as_str())
            .collect();
        eprintln!(
            "\n⛔ Over-allocated engineers: {}. Failing (exit code 2).",
            over.join(", ")
        );
    }
    exit_code
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        // Try explicit config path
        Some(ref config_path) => Config::load(config_path)?,
        // Try default location
        None => match Config::load_default() {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(e) => {
                eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", config::CONFIG_FILE, e);
                Config::default()
            }
        },
    };

    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;

    fn row(name: &str, overallocated: u32) -> UtilizationRow {
        UtilizationRow {
            engineer_id: name.to_lowercase(),
            name: name.to_string(),
            capacity: 100,
            allocation: 100 + overallocated,
            available: 0,
            overallocated,
        }
    }

    #[test]
    fn test_overallocation_exit_code() {
        let balanced = vec![row("Grace", 0), row("Linus", 0)];
        let overbooked = vec![row("Ada", 10), row("Grace", 0)];

        assert_eq!(overallocation_exit_code(false, &overbooked), 0);
        assert_eq!(overallocation_exit_code(true, &balanced), 0);
        assert_eq!(overallocation_exit_code(true, &[]), 0);
        assert_eq!(overallocation_exit_code(true, &overbooked), 2);
    }

    #[test]
    fn test_corrupt_session_does_not_block_login_or_logout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = SessionStore::new(&path);

        for command in [
            vec!["ermdash", "logout"],
            vec!["ermdash", "login", "--email", "ada@example.com", "--password", "pw"],
        ] {
            let args = Args::try_parse_from(command).unwrap();
            assert!(resolve_session(&args, &store).unwrap().is_none());
        }

        let args = Args::try_parse_from(["ermdash", "whoami"]).unwrap();
        assert!(resolve_session(&args, &store).is_err());
    }

    #[test]
    fn test_token_flag_overrides_saved_session() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("missing.json"));

        let args = Args::try_parse_from(["ermdash", "--token", "abc", "whoami"]).unwrap();
        let session = resolve_session(&args, &store).unwrap().unwrap();
        assert_eq!(session.token, "abc");
        assert!(session.user.is_none());
    }
}
