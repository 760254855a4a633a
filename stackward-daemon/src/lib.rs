//! Process runtime: initial reconcile pass, change watcher, signal shutdown.

mod error;
mod runtime;
pub mod watcher;

pub use error::DaemonError;
pub use runtime::{run, start_blocking};
pub use watcher::watch_stacks;
