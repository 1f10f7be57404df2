//! Configuration loading for the analytics janitor.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `<config dir>/analytics-janitor/config.toml`.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

const APP_NAME: &str = "analytics-janitor";

/// What the definition synchronizer does with the children of a node whose
/// own push failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFailurePolicy {
    /// Leave the failed node's descendants unvisited.
    #[default]
    SkipSubtree,
    /// Keep walking into the failed node's children.
    ContinueIntoChildren,
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Datastore connection string
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Dialect name used to pick script templates
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// Root directory of the script template store
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,

    /// Character separating statements in composite scripts
    #[serde(default = "default_statement_delimiter")]
    pub statement_delimiter: String,

    /// Per-statement timeout in seconds
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,

    /// File name used when a backup destination is a directory.
    /// Supports `{database}` and `{timestamp}` placeholders.
    #[serde(default = "default_backup_filename_template")]
    pub backup_filename_template: String,

    /// Path to the definition hierarchy file
    #[serde(default = "default_definitions_path")]
    pub definitions_path: String,

    /// Policy for descendants of a definition that failed to push
    #[serde(default)]
    pub sync_failure_policy: SyncFailurePolicy,

    /// How long finished jobs stay pollable, in seconds
    #[serde(default = "default_job_retention_secs")]
    pub job_retention_secs: u64,

    /// Interval between job polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Actor recorded in audit entries
    #[serde(default = "default_actor")]
    pub actor: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

fn default_database_url() -> String {
    "postgres://localhost/analytics".to_string()
}

fn default_dialect() -> String {
    "postgres".to_string()
}

fn default_templates_dir() -> String {
    project_dirs()
        .map(|p| p.data_local_dir().join("templates"))
        .unwrap_or_else(|| PathBuf::from("./templates"))
        .to_string_lossy()
        .to_string()
}

fn default_statement_delimiter() -> String {
    ";".to_string()
}

fn default_script_timeout_secs() -> u64 {
    1200
}

fn default_backup_filename_template() -> String {
    "{database}-{timestamp}.bak".to_string()
}

fn default_definitions_path() -> String {
    project_dirs()
        .map(|p| p.data_local_dir().join("definitions.json"))
        .unwrap_or_else(|| PathBuf::from("./definitions.json"))
        .to_string_lossy()
        .to_string()
}

fn default_job_retention_secs() -> u64 {
    3600
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_actor() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "operator".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            dialect: default_dialect(),
            templates_dir: default_templates_dir(),
            statement_delimiter: default_statement_delimiter(),
            script_timeout_secs: default_script_timeout_secs(),
            backup_filename_template: default_backup_filename_template(),
            definitions_path: default_definitions_path(),
            sync_failure_policy: SyncFailurePolicy::default(),
            job_retention_secs: default_job_retention_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            actor: default_actor(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (`<config dir>/analytics-janitor/config.toml`)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (JANITOR_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, SettingsError> {
        let config_dir = project_dirs()
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("database_url", defaults.database_url)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("dialect", defaults.dialect)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("templates_dir", defaults.templates_dir)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("statement_delimiter", defaults.statement_delimiter)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("script_timeout_secs", defaults.script_timeout_secs as i64)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("backup_filename_template", defaults.backup_filename_template)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("definitions_path", defaults.definitions_path)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("job_retention_secs", defaults.job_retention_secs as i64)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("poll_interval_ms", defaults.poll_interval_ms as i64)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("actor", defaults.actor)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .set_default("log_level", defaults.log_level)
            .map_err(|e| SettingsError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: JANITOR_DATABASE_URL, JANITOR_SCRIPT_TIMEOUT_SECS, etc.
        builder = builder.add_source(Environment::with_prefix("JANITOR").try_parsing(true));

        let config = builder
            .build()
            .map_err(|e| SettingsError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| SettingsError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.script_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                key: "script_timeout_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(SettingsError::Invalid {
                key: "poll_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        let mut chars = self.statement_delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() => Ok(()),
            _ => Err(SettingsError::Invalid {
                key: "statement_delimiter",
                reason: format!(
                    "must be a single non-whitespace character, got {:?}",
                    self.statement_delimiter
                ),
            }),
        }
    }

    /// The statement delimiter as a character. Falls back to `;` for values
    /// that did not pass validation.
    pub fn delimiter(&self) -> char {
        self.statement_delimiter.chars().next().unwrap_or(';')
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn templates_path(&self) -> PathBuf {
        PathBuf::from(&self.templates_dir)
    }

    pub fn definitions_file(&self) -> PathBuf {
        PathBuf::from(&self.definitions_path)
    }
}
