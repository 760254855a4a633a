//! Remote inventory tables and the shared, lock-guarded unit map.

use std::sync::{Mutex, MutexGuard};

use stackward_core::{
    index_targets, index_units, CompositeKey, DeployedUnit, TargetIndex, UnitIndex,
};
use stackward_remote::RemoteApi;

use crate::error::SyncError;

/// Result of [`Inventory::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The key was already known; holds a copy of the record.
    Existing(DeployedUnit),
    /// The key was absent; a placeholder now reserves it for the caller.
    Reserved,
}

/// Units known to exist remotely, keyed by [`CompositeKey`].
///
/// Every check-then-insert happens under one lock acquisition, so at most one
/// caller can ever reserve a given key.
#[derive(Debug, Default)]
pub struct Inventory {
    units: Mutex<UnitIndex>,
}

impl Inventory {
    pub fn new(units: UnitIndex) -> Self {
        Self {
            units: Mutex::new(units),
        }
    }

    pub fn get(&self, key: &CompositeKey) -> Option<DeployedUnit> {
        self.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &CompositeKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sorted snapshot of the known keys.
    pub fn keys(&self) -> Vec<CompositeKey> {
        let mut keys: Vec<_> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Return the existing record, or insert a placeholder and report `Reserved`.
    pub fn claim(&self, key: &CompositeKey) -> Claim {
        let mut units = self.lock();
        match units.get(key) {
            Some(unit) => Claim::Existing(unit.clone()),
            None => {
                units.insert(key.clone(), DeployedUnit::default());
                Claim::Reserved
            }
        }
    }

    /// Drop a reservation whose create failed. Real records are left alone.
    pub fn release(&self, key: &CompositeKey) {
        let mut units = self.lock();
        if units.get(key).is_some_and(DeployedUnit::is_placeholder) {
            units.remove(key);
        }
    }

    /// Replace a record, typically a placeholder, with the remote's version.
    pub fn upgrade(&self, key: &CompositeKey, unit: DeployedUnit) {
        self.lock().insert(key.clone(), unit);
    }

    fn lock(&self) -> MutexGuard<'_, UnitIndex> {
        // The map holds plain data; a panic elsewhere cannot leave it half-written.
        self.units.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Targets and units fetched once at startup.
#[derive(Debug)]
pub struct RemoteInventory {
    pub targets: TargetIndex,
    pub units: Inventory,
}

impl RemoteInventory {
    /// List targets, then units, and build the lookup tables.
    pub fn fetch(remote: &dyn RemoteApi) -> Result<Self, SyncError> {
        let targets = index_targets(remote.list_targets()?);
        let units = index_units(remote.list_units()?);
        tracing::info!(
            targets = targets.len(),
            stacks = units.len(),
            "fetched remote inventory"
        );
        Ok(Self {
            targets,
            units: Inventory::new(units),
        })
    }
}
