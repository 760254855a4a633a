//! Error types for stackward-core.

use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration failures. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was absent or empty after merging flags and file.
    #[error("{flag} must be set")]
    Missing { flag: &'static str },

    /// The config file could not be read.
    #[error("I/O error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`crate::config::ConfigFile`].
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Directory listing failures. Fatal for the root, recoverable per node.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read directory '{}': {source}", path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
