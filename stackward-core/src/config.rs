//! Runtime configuration.
//!
//! Values come from three layers, highest priority first: command-line flags,
//! an optional YAML file, and the defaults below. [`ConfigFile`] models both
//! the file and the flag layer since every field is optional there.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_STACKS_DIR: &str = "./stacks/";
pub const DEFAULT_STACK_FILE: &str = "docker-compose.yml";

/// Client-wide bound on every remote call.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(120);

/// How often the fan-out reports `done/total`.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A partial configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub api_address: Option<String>,
    pub api_key: Option<String>,
    pub stacks_dir: Option<PathBuf>,
    pub stack_file: Option<String>,
    pub watch: Option<bool>,
    pub dry_run: Option<bool>,
    pub log_format: Option<LogFormat>,
}

impl ConfigFile {
    /// Load a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `other` on top of `self`; set fields in `other` win.
    pub fn merge(self, other: ConfigFile) -> ConfigFile {
        ConfigFile {
            api_address: other.api_address.or(self.api_address),
            api_key: other.api_key.or(self.api_key),
            stacks_dir: other.stacks_dir.or(self.stacks_dir),
            stack_file: other.stack_file.or(self.stack_file),
            watch: other.watch.or(self.watch),
            dry_run: other.dry_run.or(self.dry_run),
            log_format: other.log_format.or(self.log_format),
        }
    }

    /// Apply defaults and validate required settings.
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let api_address = non_empty(self.api_address, "api-address")?
            .trim_end_matches('/')
            .to_string();
        let api_key = non_empty(self.api_key, "api-key")?;
        let stacks_dir = with_trailing_separator(
            self.stacks_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STACKS_DIR)),
        );

        Ok(Config {
            api_address,
            api_key,
            stacks_dir,
            stack_file: self
                .stack_file
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_STACK_FILE.to_string()),
            watch: self.watch.unwrap_or(false),
            dry_run: self.dry_run.unwrap_or(false),
            log_format: self.log_format.unwrap_or_default(),
        })
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base address of the remote API, without a trailing slash.
    pub api_address: String,
    pub api_key: String,
    /// Root of the `<node>/<stack>/<file>` tree, always ending in a separator.
    pub stacks_dir: PathBuf,
    /// File name of the definition inside each stack directory.
    pub stack_file: String,
    pub watch: bool,
    pub dry_run: bool,
    pub log_format: LogFormat,
}

fn non_empty(value: Option<String>, flag: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { flag }),
    }
}

fn with_trailing_separator(path: PathBuf) -> PathBuf {
    let raw = path.as_os_str().to_string_lossy();
    if raw.ends_with('/') || raw.ends_with(MAIN_SEPARATOR) {
        return path;
    }
    let mut os: OsString = path.into_os_string();
    os.push(MAIN_SEPARATOR.to_string());
    PathBuf::from(os)
}
