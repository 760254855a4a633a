//! # stackward-remote
//!
//! Client for the remote orchestration API. [`RemoteApi`] is the seam used by
//! the reconciler; [`HttpRemote`] is the production implementation.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod wire;

pub use client::HttpRemote;
pub use error::RemoteError;
#[cfg(any(test, feature = "testing"))]
pub use fake::{RecordingRemote, RemoteCall};

use stackward_core::{DeployedUnit, RemoteTarget};

/// Operations the reconciler needs from the remote API.
///
/// Implementations are blocking; async callers run them on the blocking pool.
pub trait RemoteApi: Send + Sync {
    /// `GET /api/endpoints`.
    fn list_targets(&self) -> Result<Vec<RemoteTarget>, RemoteError>;

    /// `GET /api/stacks`.
    fn list_units(&self) -> Result<Vec<DeployedUnit>, RemoteError>;

    /// Current definition text of a deployed unit.
    fn unit_file(&self, unit_id: i64) -> Result<String, RemoteError>;

    /// Replace a unit's definition and pull fresh images.
    fn update_unit(&self, unit_id: i64, target_id: i64, content: &str) -> Result<(), RemoteError>;

    /// Create a unit on a target from inline definition text.
    fn create_unit(&self, target_id: i64, name: &str, content: &str) -> Result<(), RemoteError>;
}

impl<T: RemoteApi + ?Sized> RemoteApi for std::sync::Arc<T> {
    fn list_targets(&self) -> Result<Vec<RemoteTarget>, RemoteError> {
        (**self).list_targets()
    }

    fn list_units(&self) -> Result<Vec<DeployedUnit>, RemoteError> {
        (**self).list_units()
    }

    fn unit_file(&self, unit_id: i64) -> Result<String, RemoteError> {
        (**self).unit_file(unit_id)
    }

    fn update_unit(&self, unit_id: i64, target_id: i64, content: &str) -> Result<(), RemoteError> {
        (**self).update_unit(unit_id, target_id, content)
    }

    fn create_unit(&self, target_id: i64, name: &str, content: &str) -> Result<(), RemoteError> {
        (**self).create_unit(target_id, name, content)
    }
}
