//! Configuration module for pushglob.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation and defaults. Key names follow the
//! long-standing `~/.pushglob` layout so existing files keep loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{EndpointName, RelativePath, SpaceName};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "PUSHGLOB_CONFIG";

/// Key inside a space mapping that names the local root explicitly
pub const LOCAL_ROOT_KEY: &str = "_local";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for pushglob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite ledger file. `~` is expanded.
    pub db_file: String,
    /// Endpoint name that denotes this machine.
    pub local_endpoint: EndpointName,
    /// Globus command-line client to run.
    #[serde(default = "default_globus_bin")]
    pub globus_bin: String,
    /// Endpoint name -> opaque Globus endpoint id.
    #[serde(rename = "globus_endpoints", alias = "endpoints")]
    pub endpoints: BTreeMap<EndpointName, String>,
    /// Space name -> per-endpoint root directories.
    #[serde(default)]
    pub spaces: BTreeMap<SpaceName, SpaceConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub globus: GlobusConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Root directories of one space, keyed by endpoint name.
///
/// The special key `_local` names the local root; without it the root listed
/// for the local endpoint is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceConfig {
    roots: BTreeMap<String, String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Globus client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobusConfig {
    /// Upper bound for a single `globus` invocation, in seconds.
    pub timeout_secs: u64,
}

/// Background reconcile settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Seconds between reconcile passes in watch mode.
    pub interval_secs: u64,
}

fn default_globus_bin() -> String {
    "globus".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for GlobusConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Load and validate; every problem found is reported at once.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Default configuration file location.
    ///
    /// `$PUSHGLOB_CONFIG` if set, otherwise `~/.pushglob`.
    pub fn default_path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join(".pushglob"),
        }
    }

    /// Ledger database path with `~` expanded.
    pub fn db_path(&self) -> PathBuf {
        expand_tilde(&self.db_file)
    }

    /// Opaque Globus id of a named endpoint.
    pub fn endpoint_id(&self, endpoint: &EndpointName) -> Option<&str> {
        self.endpoints.get(endpoint).map(String::as_str)
    }

    /// Configuration of a named space.
    pub fn space(&self, space: &SpaceName) -> Option<&SpaceConfig> {
        self.spaces.get(space)
    }

    /// Resolve an absolute local path to the space containing it.
    ///
    /// Returns the space and the path relative to its local root. When roots
    /// are nested, the deepest one wins.
    pub fn space_for_path(&self, path: &Path) -> Option<(SpaceName, RelativePath)> {
        self.spaces
            .iter()
            .filter_map(|(name, space)| {
                let root = space.local_root(&self.local_endpoint)?;
                let rest = path.strip_prefix(&root).ok()?;
                let relative = RelativePath::from_path(rest).ok()?;
                Some((root.components().count(), name.clone(), relative))
            })
            .max_by_key(|(depth, _, _)| *depth)
            .map(|(_, name, relative)| (name, relative))
    }
}

impl SpaceConfig {
    /// Build a space mapping from `(key, root)` pairs. Used by tests and tools.
    pub fn from_roots<K, V>(roots: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            roots: roots
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Local root directory, `~` expanded.
    ///
    /// Prefers the `_local` entry, then the entry for `local_endpoint`.
    pub fn local_root(&self, local_endpoint: &EndpointName) -> Option<PathBuf> {
        self.roots
            .get(LOCAL_ROOT_KEY)
            .or_else(|| self.roots.get(local_endpoint.as_str()))
            .map(|root| expand_tilde(root))
    }

    /// Root of this space as seen by `endpoint`, verbatim.
    pub fn endpoint_root(&self, endpoint: &EndpointName) -> Option<&str> {
        self.roots.get(endpoint.as_str()).map(String::as_str)
    }

    /// Endpoint keys of this mapping (everything except `_local`).
    pub fn endpoint_keys(&self) -> impl Iterator<Item = &str> {
        self.roots
            .keys()
            .map(String::as_str)
            .filter(|k| *k != LOCAL_ROOT_KEY)
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"spaces.docs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.db_file.trim().is_empty() {
            errors.push(ValidationError {
                field: "db_file".into(),
                message: "must not be empty".into(),
            });
        }
        if self.globus_bin.trim().is_empty() {
            errors.push(ValidationError {
                field: "globus_bin".into(),
                message: "must not be empty".into(),
            });
        }

        // --- endpoints ---
        if !self.endpoints.contains_key(&self.local_endpoint) {
            errors.push(ValidationError {
                field: "local_endpoint".into(),
                message: format!(
                    "'{}' is not listed in globus_endpoints",
                    self.local_endpoint
                ),
            });
        }
        for (name, id) in &self.endpoints {
            if id.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("globus_endpoints.{name}"),
                    message: "endpoint id must not be empty".into(),
                });
            }
        }

        // --- spaces ---
        for (space_name, space) in &self.spaces {
            for key in space.endpoint_keys() {
                let known = EndpointName::new(key)
                    .map(|name| self.endpoints.contains_key(&name))
                    .unwrap_or(false);
                if !known {
                    errors.push(ValidationError {
                        field: format!("spaces.{space_name}.{key}"),
                        message: format!("unknown endpoint '{key}'"),
                    });
                }
            }
            if space.local_root(&self.local_endpoint).is_none() {
                errors.push(ValidationError {
                    field: format!("spaces.{space_name}"),
                    message: format!(
                        "no local root: add '{LOCAL_ROOT_KEY}' or an entry for '{}'",
                        self.local_endpoint
                    ),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- globus / reconcile ---
        if self.globus.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "globus.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.reconcile.interval_secs == 0 {
            errors.push(ValidationError {
                field: "reconcile.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        errors
    }
}
