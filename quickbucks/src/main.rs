//! Browse an exported `quickbucks` task collection from the terminal.
//!
//! Loads a JSON export (`{"tasks": {...}, "users": {...}}`) into the
//! in-memory backend and runs one query against it. Output is JSON on stdout;
//! logs go to a file.
//!
//! ```bash
//! quickbucks --data export.json --user u1 browse --query lawn --sort price_low
//! quickbucks --data export.json --user u1 mine
//! quickbucks --data export.json stats u2
//! quickbucks thread-id alice bob
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;

use quickbucks::chat::thread_id;
use quickbucks::config::{BrowseArgs, CliArgs, ClientConfig, Command};
use quickbucks::device::{DeviceError, StaticLocation, resolve_origin};
use quickbucks::profile::{ProfileError, ProfileService};
use quickbucks::store::StoreError;
use quickbucks::store::memory::{DataExport, InMemoryAuth, InMemoryBackend};
use quickbucks::tasks::{PriceRange, TaskError, TaskFilters, TaskService, haversine_km};
use quickbucks_proto::task::{Coordinates, Task, TaskId};
use quickbucks_proto::user::{Identity, UserId};

/// Errors surfaced to the terminal.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no data file given (use --data or QUICKBUCKS_DATA)")]
    NoData,
    #[error("failed to read {path}: {source}")]
    ReadData {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

/// A task with its id and, when an origin is known, its distance.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Listing<'a> {
    id: &'a TaskId,
    #[serde(flatten)]
    task: &'a Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_km: Option<f64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig {
                data: cli.data.clone(),
                user: cli.user.clone(),
                ..ClientConfig::default()
            }
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("quickbucks starting");

    let command = cli
        .command
        .clone()
        .unwrap_or_else(|| Command::Browse(BrowseArgs::default()));

    match run(command, &config).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Stdout carries command output, so logs always go to a file. Returns a
/// [`WorkerGuard`] that must be held until shutdown to flush buffered
/// entries.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("quickbucks.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(command: Command, config: &ClientConfig) -> Result<String, CliError> {
    match command {
        Command::ThreadId { a, b } => Ok(thread_id(&UserId::new(a), &UserId::new(b)).to_string()),
        Command::Browse(args) => {
            let tasks = task_service(load_backend(config).await?, config);
            let filters = browse_filters(&args, config).await;
            let found = tasks.browse(&args.query, &filters).await?;
            listings(&found, filters.origin)
        }
        Command::Mine => {
            let tasks = task_service(load_backend(config).await?, config);
            listings(&tasks.my_tasks().await?, None)
        }
        Command::Stats { user } => {
            let backend = load_backend(config).await?;
            let profiles = ProfileService::new(backend.clone(), backend);
            let summary = profiles.summary(&UserId::new(user)).await?;
            Ok(serde_json::to_string_pretty(&summary)?)
        }
    }
}

/// Task service signed in as `--user`, or signed out when none is given.
fn task_service(
    backend: InMemoryBackend,
    config: &ClientConfig,
) -> TaskService<InMemoryBackend, InMemoryAuth, InMemoryBackend> {
    let auth = config.user.as_ref().map_or_else(InMemoryAuth::new, |user| {
        InMemoryAuth::signed_in(Identity {
            id: UserId::new(user.as_str()),
            display_name: None,
            photo_url: None,
        })
    });
    TaskService::new(backend.clone(), auth, backend, config.tasks)
}

async fn load_backend(config: &ClientConfig) -> Result<InMemoryBackend, CliError> {
    let path = config.data.as_ref().ok_or(CliError::NoData)?;
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadData {
        path: path.display().to_string(),
        source,
    })?;
    let export = DataExport::from_json(&text)?;
    let (tasks, users) = (export.tasks.len(), export.users.len());
    let backend = InMemoryBackend::import(export).await?;
    tracing::info!(tasks, users, path = %path.display(), "export loaded");
    Ok(backend)
}

async fn browse_filters(args: &BrowseArgs, config: &ClientConfig) -> TaskFilters {
    let defaults = PriceRange::up_to(config.tasks.limits.max_budget);
    let origin = if args.wants_distance() {
        let provider = StaticLocation(
            args.origin
                .ok_or_else(|| DeviceError::Unavailable("no --origin given".to_string())),
        );
        Some(resolve_origin(&provider).await)
    } else {
        None
    };
    TaskFilters {
        categories: args.categories.iter().copied().collect::<BTreeSet<_>>(),
        price_range: PriceRange {
            min: args.min_price.unwrap_or(defaults.min),
            max: args.max_price.unwrap_or(defaults.max),
        },
        sort_by: args.sort,
        urgent_only: args.urgent,
        max_distance_km: args.radius.unwrap_or(config.search_radius_km),
        origin,
    }
}

fn listings(tasks: &[Task], origin: Option<Coordinates>) -> Result<String, CliError> {
    let rows: Vec<Listing<'_>> = tasks
        .iter()
        .map(|task| Listing {
            id: &task.id,
            task,
            distance_km: origin.map(|o| haversine_km(o, task.location.coordinates)),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}
