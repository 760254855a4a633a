//! Stackward — reconcile a tree of stack definitions against a remote API.
//!
//! # Usage
//!
//! ```text
//! stackward --api-address <url> --api-key <key> [--stacks-dir ./stacks/]
//!           [--stack-file docker-compose.yml] [-w] [--dry-run]
//!           [--config stackward.yaml] [--log-format text|json]
//! ```
//!
//! The tree is `<stacks-dir>/<node>/<stack>/<stack-file>`. Each node directory
//! name must match a remote endpoint name; unmatched nodes are ignored.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;

use stackward_core::{ConfigFile, LogFormat};

#[derive(Parser, Debug)]
#[command(
    name = "stackward",
    version,
    about = "Create or update remote stacks from a local directory tree",
    long_about = None,
)]
struct Cli {
    /// Base address of the remote API.
    #[arg(long, env = "STACKWARD_API_ADDRESS")]
    api_address: Option<String>,

    /// Pre-shared API key sent with every request.
    #[arg(long, env = "STACKWARD_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Root of the `<node>/<stack>` tree [default: ./stacks/].
    #[arg(long)]
    stacks_dir: Option<PathBuf>,

    /// Definition file name inside each stack directory [default: docker-compose.yml].
    #[arg(long)]
    stack_file: Option<String>,

    /// Keep running and reconcile stacks as their files change.
    #[arg(short = 'w', long)]
    watch: bool,

    /// Compare and report, but never create or update remote stacks.
    #[arg(long)]
    dry_run: bool,

    /// YAML file with the same settings; flags take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log line format.
    #[arg(long)]
    log_format: Option<LogFormatArg>,
}

impl Cli {
    fn into_layer(self) -> (Option<PathBuf>, ConfigFile) {
        let layer = ConfigFile {
            api_address: self.api_address,
            api_key: self.api_key,
            stacks_dir: self.stacks_dir,
            stack_file: self.stack_file,
            watch: self.watch.then_some(true),
            dry_run: self.dry_run.then_some(true),
            log_format: self.log_format.map(LogFormat::from),
        };
        (self.config, layer)
    }
}

// ---------------------------------------------------------------------------
// LogFormat argument
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `LogFormat` from CLI args.
#[derive(Debug, Clone, Copy)]
struct LogFormatArg(LogFormat);

impl FromStr for LogFormatArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self(LogFormat::Text)),
            "json" => Ok(Self(LogFormat::Json)),
            other => Err(format!("unknown log format '{other}'; expected: text, json")),
        }
    }
}

impl fmt::Display for LogFormatArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        arg.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let (config_path, flags) = Cli::parse().into_layer();

    let file = match config_path {
        Some(path) => ConfigFile::load(&path)?,
        None => ConfigFile::default(),
    };
    let config = file.merge(flags).resolve()?;

    stackward_daemon::start_blocking(config).context("stack reconciliation aborted")?;
    Ok(())
}
