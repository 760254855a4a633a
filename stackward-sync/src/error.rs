//! Error types for stackward-sync.

use std::path::PathBuf;

use thiserror::Error;

use stackward_core::{ScanError, StackRef};
use stackward_remote::RemoteError;

/// Failure of a single `(node, stack)` reconciliation. Never fatal to a batch.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to read '{}' for {stack}: {source}", path.display())]
    ReadDefinition {
        stack: StackRef,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to {action} {stack}: {source}")]
    Remote {
        stack: StackRef,
        action: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("reconcile worker for {stack} did not complete: {message}")]
    Worker { stack: StackRef, message: String },
}

impl ReconcileError {
    pub fn stack(&self) -> &StackRef {
        match self {
            ReconcileError::ReadDefinition { stack, .. }
            | ReconcileError::Remote { stack, .. }
            | ReconcileError::Worker { stack, .. } => stack,
        }
    }
}

/// Failures that abort a whole pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching targets or units failed; nothing can be reconciled.
    #[error("failed to fetch remote inventory: {0}")]
    Inventory(#[from] RemoteError),

    /// The stack root itself could not be listed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}
