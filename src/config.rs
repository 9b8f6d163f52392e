//! Configuration for the watcher.
//!
//! Settings are layered, later sources winning:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TREEWATCH_` and use double
//! underscores to separate nested levels:
//! - `TREEWATCH_WATCH__RECURSIVE=true` sets `watch.recursive`
//! - `TREEWATCH_EXEC__SHELL=/bin/bash` sets `exec.shell`
//! - `TREEWATCH_LOGGING__DEFAULT=debug` sets `logging.default`
//!
//! [`Settings`] is what the user wrote. [`RuntimeConfig`] is the validated form
//! the watcher runs with: the root is canonical, the event list is a mask and
//! the patterns are compiled.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::paths::{self, PathError};
use crate::watcher::{EventFilter, EventMask, WatchError};

const CONFIG_DIR: &str = ".treewatch";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "TREEWATCH_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No directory to watch. Pass -d DIRECTORY or set watch.directory")]
    MissingDirectory,

    #[error("Cannot watch '{path}': {source}")]
    InvalidDirectory {
        path: String,
        #[source]
        source: PathError,
    },

    #[error("Nothing to do on events. Pass -c COMMAND or -F FORMAT")]
    MissingOutput,

    #[error("A command and an output format are both set; use only one")]
    ConflictingOutput,

    #[error("The command is empty")]
    EmptyCommand,

    #[error("Unknown event type '{name}'")]
    UnknownEvent { name: String },

    #[error("Invalid {field} pattern: {source}")]
    InvalidRegex {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to load configuration: {reason}")]
    Load { reason: String },

    #[error("Failed to serialize configuration: {reason}")]
    Serialize { reason: String },

    #[error("Failed to save configuration to '{path}': {reason}")]
    Save { path: PathBuf, reason: String },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,

    /// What to watch and which events qualify
    #[serde(default)]
    pub watch: WatchSettings,

    /// What to do when an event qualifies
    #[serde(default)]
    pub exec: ExecSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level for everything without a module override
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module levels, e.g. `registry = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,

    /// Send log lines to syslog instead of stderr
    #[serde(default)]
    pub syslog: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchSettings {
    /// Root directory to watch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    /// Watch subdirectories too
    #[serde(default)]
    pub recursive: bool,

    /// Follow symbolic links to directories
    #[serde(default = "default_true")]
    pub follow_symlinks: bool,

    /// Event names; empty or `["default"]` means modify, create, delete, move
    #[serde(default = "default_events")]
    pub events: Vec<String>,

    /// Names matching this pattern are ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    /// Only names matching this pattern trigger; the first group becomes `%x`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExecSettings {
    /// Shell used to run the command
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Command template run per event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Output template printed per event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_events() -> Vec<String> {
    vec!["default".to_string()]
}
fn default_shell() -> String {
    "/bin/sh".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            logging: LoggingConfig::default(),
            watch: WatchSettings::default(),
            exec: ExecSettings::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
            syslog: false,
        }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            directory: None,
            recursive: false,
            follow_symlinks: default_true(),
            events: default_events(),
            exclude: None,
            catch: None,
        }
    }
}

impl Default for ExecSettings {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            command: None,
            format: None,
        }
    }
}

impl Settings {
    /// Load configuration from all sources, using the nearest
    /// `.treewatch/settings.toml` when there is one.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        Self::figment(&config_path)
            .extract()
            .map_err(|e| ConfigError::Load {
                reason: e.to_string(),
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::Load {
                reason: format!("'{}' is not a readable file", path.display()),
            });
        }

        Self::figment(path).extract().map_err(|e| ConfigError::Load {
            reason: e.to_string(),
        })
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels; single underscores
            // stay part of the field name.
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find the nearest `.treewatch` directory, searching from the current
    /// directory up to the filesystem root.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Render the settings as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            reason: e.to_string(),
        })
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let save_error = |reason: String| ConfigError::Save {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }

        let toml_string = self.to_toml()?;
        std::fs::write(path, toml_string).map_err(|e| save_error(e.to_string()))
    }
}

/// How each qualifying event is acted upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Run the rendered template through the shell.
    Command(String),
    /// Print the rendered template to stdout.
    Format(String),
}

/// Validated settings, built once before watching starts and shared
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Canonical root path with a trailing separator
    pub root_path: String,
    pub mask: EventMask,
    pub recursive: bool,
    pub follow_symlinks: bool,
    pub filter: EventFilter,
    pub output: OutputMode,
    pub shell: String,
}

impl RuntimeConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let watch = &settings.watch;
        let exec = &settings.exec;

        let output = match (&exec.command, &exec.format) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingOutput),
            (None, None) => return Err(ConfigError::MissingOutput),
            (Some(command), None) if command.trim().is_empty() => {
                return Err(ConfigError::EmptyCommand);
            }
            (Some(command), None) => OutputMode::Command(command.clone()),
            (None, Some(format)) => OutputMode::Format(format.clone()),
        };

        let directory = watch
            .directory
            .as_deref()
            .ok_or(ConfigError::MissingDirectory)?;
        let root_path =
            paths::canonicalize(directory).map_err(|source| ConfigError::InvalidDirectory {
                path: directory.to_string(),
                source,
            })?;

        let mask = EventMask::parse_list(&watch.events).map_err(|e| match e {
            WatchError::UnknownEvent { name } => ConfigError::UnknownEvent { name },
            other => ConfigError::Load {
                reason: other.to_string(),
            },
        })?;

        let filter = EventFilter::new(
            compile("exclude", watch.exclude.as_deref())?,
            compile("catch", watch.catch.as_deref())?,
        );

        Ok(Self {
            root_path,
            mask,
            recursive: watch.recursive,
            follow_symlinks: watch.follow_symlinks,
            filter,
            output,
            shell: exec.shell.clone(),
        })
    }

    /// Defaults for watching `root_path` without going through [`Settings`]:
    /// recursive, following symlinks, default events, no patterns, and a
    /// `%e %p%f` output line.
    pub fn for_root(root_path: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            mask: EventMask::DEFAULT,
            recursive: true,
            follow_symlinks: true,
            filter: EventFilter::allow_all(),
            output: OutputMode::Format("%e %p%f".to_string()),
            shell: default_shell(),
        }
    }
}

fn compile(field: &'static str, pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    pattern
        .map(|p| Regex::new(p).map_err(|source| ConfigError::InvalidRegex { field, source }))
        .transpose()
}
