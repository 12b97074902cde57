// crates/server/src/config.rs
//! Command line and configuration file handling.
//!
//! Settings come from three places, later ones winning: built-in defaults,
//! an optional TOML file, then command line flags (each with an
//! `APPLYKIT_*` environment fallback).

use std::fs;
use std::path::{Path, PathBuf};

use applykit_core::runner::{RunnerConfig, RunnerMode};
use applykit_types::DEFAULT_OWNER;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use thiserror::Error;

/// `database_path` value selecting an in-memory record store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Parser)]
#[command(name = "applykit")]
#[command(about = "Job search, application kit and form fill task service", version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Serve flags when no subcommand is given
    #[command(flatten)]
    pub serve: ServeArgs,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "APPLYKIT_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve(ServeArgs),

    /// Load and validate the configuration, then exit
    CheckConfig(ServeArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Path to a TOML config file
    #[arg(long, short = 'c', env = "APPLYKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "APPLYKIT_HOST")]
    pub host: Option<String>,

    #[arg(long, short = 'p', env = "APPLYKIT_PORT")]
    pub port: Option<u16>,

    /// SQLite file, or `:memory:`
    #[arg(long, env = "APPLYKIT_DATABASE")]
    pub database: Option<PathBuf>,

    #[arg(long, env = "APPLYKIT_BLOB_DIR")]
    pub blob_dir: Option<PathBuf>,

    /// Runner implementation: mock or live
    #[arg(long, env = "APPLYKIT_RUNNER_MODE")]
    pub runner: Option<String>,

    #[arg(long, env = "APPLYKIT_RESEARCH_API_KEY", hide_env_values = true)]
    pub research_api_key: Option<String>,

    #[arg(long, env = "APPLYKIT_BROWSING_API_KEY", hide_env_values = true)]
    pub browsing_api_key: Option<String>,

    #[arg(long, env = "APPLYKIT_SIGNING_SECRET", hide_env_values = true)]
    pub signing_secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Full service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub runner: RunnerConfig,
    pub tasks: TaskSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Base of presigned blob links. Defaults to `http://{host}:{port}`.
    pub public_base_url: Option<String>,
    /// Owner for requests that do not name a `user_id`.
    pub default_owner: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            public_base_url: None,
            default_owner: DEFAULT_OWNER.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    pub blob_dir: Option<PathBuf>,
    /// HMAC key for blob links. A random one is generated when unset.
    pub signing_secret: Option<String>,
    pub presign_ttl_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            blob_dir: None,
            signing_secret: None,
            presign_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub worker_concurrency: usize,
    pub queue_capacity: usize,
    /// Open tasks untouched this long are failed. 0 disables the reaper.
    pub stale_after_secs: u64,
    pub reaper_interval_secs: u64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            worker_concurrency: 4,
            queue_capacity: 256,
            stale_after_secs: 900,
            reaper_interval_secs: 60,
        }
    }
}

impl Cli {
    /// The subcommand to run; bare `applykit` serves.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, overlaid with the file named by `args` (if any), overlaid
    /// with the flags themselves. The result is validated.
    pub fn load(args: &ServeArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                Self::from_toml_str(&raw, path)?
            }
            None => Self::default(),
        };
        config.apply_args(args)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_args(&mut self, args: &ServeArgs) -> Result<(), ConfigError> {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(database) = &args.database {
            self.storage.database_path = Some(database.clone());
        }
        if let Some(blob_dir) = &args.blob_dir {
            self.storage.blob_dir = Some(blob_dir.clone());
        }
        if let Some(mode) = &args.runner {
            self.runner.mode = parse_mode(mode)?;
        }
        if let Some(key) = &args.research_api_key {
            self.runner.research_api_key = Some(key.clone());
        }
        if let Some(key) = &args.browsing_api_key {
            self.runner.browsing_api_key = Some(key.clone());
        }
        if let Some(secret) = &args.signing_secret {
            self.storage.signing_secret = Some(secret.clone());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.default_owner.trim().is_empty() {
            return Err(ConfigError::Invalid("server.default_owner must not be empty".into()));
        }
        if self.storage.presign_ttl_secs == 0 {
            return Err(ConfigError::Invalid("storage.presign_ttl_secs must be positive".into()));
        }
        if self.tasks.worker_concurrency == 0 {
            return Err(ConfigError::Invalid("tasks.worker_concurrency must be at least 1".into()));
        }
        if self.tasks.queue_capacity == 0 {
            return Err(ConfigError::Invalid("tasks.queue_capacity must be at least 1".into()));
        }
        if self.tasks.stale_after_secs > 0 && self.tasks.reaper_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "tasks.reaper_interval_secs must be positive when the reaper is enabled".into(),
            ));
        }
        let longest = self.runner.longest_timeout().as_secs();
        if self.tasks.stale_after_secs > 0 && self.tasks.stale_after_secs <= longest {
            return Err(ConfigError::Invalid(format!(
                "tasks.stale_after_secs ({}) must exceed the longest runner timeout ({longest}s)",
                self.tasks.stale_after_secs
            )));
        }
        Ok(())
    }

    /// Base URL presigned links point at.
    pub fn public_base_url(&self) -> String {
        self.server
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port))
    }

    pub fn uses_in_memory_database(&self) -> bool {
        self.storage
            .database_path
            .as_deref()
            .is_some_and(|p| p.as_os_str() == IN_MEMORY_DATABASE)
    }
}

fn parse_mode(raw: &str) -> Result<RunnerMode, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "mock" => Ok(RunnerMode::Mock),
        "live" => Ok(RunnerMode::Live),
        other => Err(ConfigError::Invalid(format!(
            "unknown runner mode {other:?} (expected mock or live)"
        ))),
    }
}
