//! In-memory [`RemoteApi`] that records every call.
//!
//! Creates are applied to the fake's own unit list with a fresh id, the way the
//! real API would, so a later `list_units` sees them.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use stackward_core::{DeployedUnit, RemoteTarget};

use crate::error::RemoteError;
use crate::RemoteApi;

/// One observed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    ListTargets,
    ListUnits,
    GetFile {
        unit_id: i64,
    },
    Update {
        unit_id: i64,
        target_id: i64,
        content: String,
        pull_image: bool,
    },
    Create {
        target_id: i64,
        name: String,
        content: String,
    },
}

impl RemoteCall {
    pub fn is_mutation(&self) -> bool {
        matches!(self, RemoteCall::Update { .. } | RemoteCall::Create { .. })
    }
}

#[derive(Debug, Default)]
struct State {
    targets: Vec<RemoteTarget>,
    units: Vec<DeployedUnit>,
    files: HashMap<i64, String>,
    failing: HashSet<String>,
    calls: Vec<RemoteCall>,
}

#[derive(Debug, Default)]
pub struct RecordingRemote {
    state: Mutex<State>,
}

impl RecordingRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(self, id: i64, name: &str) -> Self {
        self.lock().targets.push(RemoteTarget {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn with_unit(self, id: i64, target_id: i64, name: &str, content: &str) -> Self {
        {
            let mut state = self.lock();
            state.units.push(DeployedUnit {
                id,
                name: name.to_string(),
                status: 1,
                target_id,
            });
            state.files.insert(id, content.to_string());
        }
        self
    }

    /// Make every mutation of the stack named `name` fail with HTTP 500.
    pub fn failing_stack(self, name: &str) -> Self {
        self.lock().failing.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn creates(&self) -> Vec<RemoteCall> {
        self.filtered(|c| matches!(c, RemoteCall::Create { .. }))
    }

    pub fn updates(&self) -> Vec<RemoteCall> {
        self.filtered(|c| matches!(c, RemoteCall::Update { .. }))
    }

    pub fn mutations(&self) -> Vec<RemoteCall> {
        self.filtered(RemoteCall::is_mutation)
    }

    pub fn file_reads(&self) -> usize {
        self.filtered(|c| matches!(c, RemoteCall::GetFile { .. }))
            .len()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current remote definition of a unit.
    pub fn file(&self, unit_id: i64) -> Option<String> {
        self.lock().files.get(&unit_id).cloned()
    }

    fn filtered(&self, keep: impl Fn(&RemoteCall) -> bool) -> Vec<RemoteCall> {
        self.lock().calls.iter().filter(|c| keep(c)).cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn injected_failure(method: &'static str, url: String) -> RemoteError {
    RemoteError::Status {
        method,
        url,
        status: 500,
        body: "injected failure".to_string(),
    }
}

impl RemoteApi for RecordingRemote {
    fn list_targets(&self) -> Result<Vec<RemoteTarget>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::ListTargets);
        Ok(state.targets.clone())
    }

    fn list_units(&self) -> Result<Vec<DeployedUnit>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::ListUnits);
        Ok(state.units.clone())
    }

    fn unit_file(&self, unit_id: i64) -> Result<String, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::GetFile { unit_id });
        state.files.get(&unit_id).cloned().ok_or(RemoteError::Status {
            method: "GET",
            url: format!("fake:/api/stacks/{unit_id}/file"),
            status: 404,
            body: "stack not found".to_string(),
        })
    }

    fn update_unit(&self, unit_id: i64, target_id: i64, content: &str) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Update {
            unit_id,
            target_id,
            content: content.to_string(),
            pull_image: true,
        });
        let name = state
            .units
            .iter()
            .find(|u| u.id == unit_id)
            .map(|u| u.name.clone())
            .unwrap_or_default();
        if state.failing.contains(&name) {
            return Err(injected_failure("PUT", format!("fake:/api/stacks/{unit_id}")));
        }
        state.files.insert(unit_id, content.to_string());
        Ok(())
    }

    fn create_unit(&self, target_id: i64, name: &str, content: &str) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Create {
            target_id,
            name: name.to_string(),
            content: content.to_string(),
        });
        if state.failing.contains(name) {
            return Err(injected_failure("POST", "fake:/api/stacks".to_string()));
        }
        let id = state.units.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        state.units.push(DeployedUnit {
            id,
            name: name.to_string(),
            status: 1,
            target_id,
        });
        state.files.insert(id, content.to_string());
        Ok(())
    }
}
