//! Configuration for the `quickbucks` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/quickbucks/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use quickbucks_proto::task::{
    Coordinates, MAX_BUDGET, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS, MIN_BUDGET, TaskCategory,
};

use crate::chat::ChatSettings;
use crate::tasks::filter::DEFAULT_RADIUS_KM;
use crate::tasks::{SortBy, TaskLimits, TaskSettings};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    tasks: TasksFileConfig,
    chat: ChatFileConfig,
    media: MediaFileConfig,
}

/// `[tasks]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TasksFileConfig {
    max_title_chars: Option<usize>,
    max_description_chars: Option<usize>,
    min_budget: Option<f64>,
    max_budget: Option<f64>,
    search_radius_km: Option<f64>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    message_limit: Option<usize>,
}

/// `[media]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct MediaFileConfig {
    max_video_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// JSON export the in-memory backend is loaded from.
    pub data: Option<PathBuf>,
    /// User the session is signed in as.
    pub user: Option<String>,
    /// Task limits and verification clip length.
    pub tasks: TaskSettings,
    /// Default browse radius in kilometres.
    pub search_radius_km: f64,
    /// Chat window size.
    pub chat: ChatSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data: None,
            user: None,
            tasks: TaskSettings::default(),
            search_radius_km: DEFAULT_RADIUS_KM,
            chat: ChatSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path
    /// (`~/.config/quickbucks/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        let default_limits = defaults.tasks.limits;
        // Configured budgets may narrow the marketplace range, never widen it.
        let min_budget = budget_bound(file.tasks.min_budget, default_limits.min_budget, MIN_BUDGET);
        let max_budget = budget_bound(file.tasks.max_budget, default_limits.max_budget, min_budget);

        Self {
            data: cli.data.clone(),
            user: cli.user.clone(),
            tasks: TaskSettings {
                limits: TaskLimits {
                    max_title_chars: file
                        .tasks
                        .max_title_chars
                        .map_or(default_limits.max_title_chars, |n| n.min(MAX_TITLE_CHARS)),
                    max_description_chars: file
                        .tasks
                        .max_description_chars
                        .map_or(default_limits.max_description_chars, |n| {
                            n.min(MAX_DESCRIPTION_CHARS)
                        }),
                    min_budget,
                    max_budget,
                },
                max_video: file
                    .media
                    .max_video_secs
                    .map_or(defaults.tasks.max_video, Duration::from_secs),
            },
            search_radius_km: file
                .tasks
                .search_radius_km
                .unwrap_or(defaults.search_radius_km),
            chat: ChatSettings {
                message_limit: file
                    .chat
                    .message_limit
                    .unwrap_or(defaults.chat.message_limit),
            },
        }
    }
}

/// A configured budget bound clamped into `low..=MAX_BUDGET`.
///
/// Missing or non-finite values fall back to `default`.
fn budget_bound(value: Option<f64>, default: f64, low: f64) -> f64 {
    value
        .filter(|v| v.is_finite())
        .unwrap_or(default)
        .clamp(low, MAX_BUDGET)
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Browse a QuickBucks task export")]
pub struct CliArgs {
    /// JSON export with `tasks` and `users` collections.
    #[arg(long, env = "QUICKBUCKS_DATA")]
    pub data: Option<PathBuf>,

    /// User id to act as.
    #[arg(long, env = "QUICKBUCKS_USER")]
    pub user: Option<String>,

    /// Path to config file (default: `~/.config/quickbucks/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "QUICKBUCKS_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/quickbucks.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do; defaults to `browse`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List open tasks posted by other users.
    Browse(BrowseArgs),
    /// List tasks posted by `--user`.
    Mine,
    /// Show a user's profile statistics.
    Stats {
        /// User id.
        user: String,
    },
    /// Print the chat thread id shared by two users.
    ThreadId {
        /// First participant.
        a: String,
        /// Second participant.
        b: String,
    },
}

/// Search and filter options for `browse`.
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct BrowseArgs {
    /// Case-insensitive text to look for in title, description or address.
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Result order: `recent`, `price_high`, `price_low` or `distance`.
    #[arg(long, default_value_t = SortBy::Recent)]
    pub sort: SortBy,

    /// Keep only these categories (repeatable).
    #[arg(long = "category")]
    pub categories: Vec<TaskCategory>,

    /// Lowest budget kept.
    #[arg(long)]
    pub min_price: Option<f64>,

    /// Highest budget kept.
    #[arg(long)]
    pub max_price: Option<f64>,

    /// Keep only urgent tasks.
    #[arg(long)]
    pub urgent: bool,

    /// Reference point as `LAT,LON`.
    #[arg(long, value_parser = parse_coordinates)]
    pub origin: Option<Coordinates>,

    /// Maximum distance from the origin in kilometres.
    #[arg(long)]
    pub radius: Option<f64>,
}

impl BrowseArgs {
    /// Whether any option needs a reference point.
    #[must_use]
    pub fn wants_distance(&self) -> bool {
        self.origin.is_some() || self.radius.is_some() || self.sort == SortBy::Distance
    }
}

/// Parses `LAT,LON` in decimal degrees.
///
/// # Errors
///
/// Returns a message if either part is missing, not a number, or out of
/// range.
pub fn parse_coordinates(raw: &str) -> Result<Coordinates, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{raw}'"))?;
    let latitude: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("bad latitude '{lat}': {e}"))?;
    let longitude: f64 = lon
        .trim()
        .parse()
        .map_err(|e| format!("bad longitude '{lon}': {e}"))?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("coordinates out of range: {latitude},{longitude}"));
    }
    Ok(Coordinates::new(latitude, longitude))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("quickbucks").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
