//! Domain types shared by the inventory client, reconciler and watcher.
//!
//! Remote ids are plain integers assigned by the orchestration API. Node and
//! stack names are taken verbatim from directory names on disk.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Remote records
// ---------------------------------------------------------------------------

/// A remote execution target ("endpoint"). Its `name` matches a node directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    pub id: i64,
    pub name: String,
}

/// A deployed stack as reported by the remote API.
///
/// The [`Default`] value is the placeholder inserted after a create: it has no
/// remote id until the unit list is fetched again.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeployedUnit {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub status: i64,
    #[serde(rename = "endpointId")]
    pub target_id: i64,
}

impl DeployedUnit {
    /// Key under which this unit is tracked in the shared inventory.
    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(self.target_id, &self.name)
    }

    /// `true` for the zero-value record inserted after a create.
    pub fn is_placeholder(&self) -> bool {
        self.id == 0
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// `<target id>-<stack name>`, the sole existence test for a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey(pub String);

impl CompositeKey {
    pub fn new(target_id: i64, stack: &str) -> Self {
        Self(format!("{target_id}-{stack}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CompositeKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A local `(node, stack)` pair discovered on disk or parsed from an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackRef {
    pub node: String,
    pub stack: String,
}

impl StackRef {
    pub fn new(node: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            stack: stack.into(),
        }
    }
}

impl fmt::Display for StackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.stack)
    }
}

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

/// Targets keyed by name.
pub type TargetIndex = HashMap<String, RemoteTarget>;

/// Deployed units keyed by [`CompositeKey`].
pub type UnitIndex = HashMap<CompositeKey, DeployedUnit>;

/// Build the by-name target table. Later duplicates win.
pub fn index_targets(targets: Vec<RemoteTarget>) -> TargetIndex {
    targets.into_iter().map(|t| (t.name.clone(), t)).collect()
}

/// Build the by-composite-key unit table.
pub fn index_units(units: Vec<DeployedUnit>) -> UnitIndex {
    units.into_iter().map(|u| (u.key(), u)).collect()
}
