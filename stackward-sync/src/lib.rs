//! # stackward-sync
//!
//! Reconciliation engine: shared inventory, per-stack reconciler and the
//! concurrent fan-out used for the initial pass.
//!
//! Reconciliation is one-way. Local files are the source of truth; remote
//! stacks without a local directory are never deleted, and a renamed stack
//! directory is a new identity that leaves the old remote stack in place.

pub mod diff;
pub mod error;
pub mod fanout;
pub mod inventory;
pub mod reconcile;

pub use error::{ReconcileError, SyncError};
pub use fanout::{reconcile_all, FanoutSummary};
pub use inventory::{Claim, Inventory, RemoteInventory};
pub use reconcile::{reconcile_blocking, Outcome, Reconciler};
