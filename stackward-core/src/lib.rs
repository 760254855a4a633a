//! Stackward core library — domain types, configuration, stack tree layout.
//!
//! - [`types`] — remote records, composite keys, lookup tables
//! - [`config`] — layered configuration and validation
//! - [`layout`] — directory scanner and event-path parsing
//! - [`error`] — [`ConfigError`], [`ScanError`]

pub mod config;
pub mod error;
pub mod layout;
pub mod types;

pub use config::{Config, ConfigFile, LogFormat};
pub use error::{ConfigError, ScanError};
pub use layout::{stack_for_path, StackLayout};
pub use types::{
    index_targets, index_units, CompositeKey, DeployedUnit, RemoteTarget, StackRef, TargetIndex,
    UnitIndex,
};
