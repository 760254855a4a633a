//! Create-vs-update-vs-skip decision for one `(node, stack)` pair.
//!
//! 1. Resolve the node name to a remote target; unknown nodes are skipped.
//! 2. Derive the composite key and read the local definition fresh from disk.
//! 3. Known key: fetch the remote definition, compare text, PUT only on change.
//!    Files that are not valid UTF-8 are compared and sent in their lossy
//!    decoding, so a repeat pass settles on the uploaded text.
//! 4. Unknown key: reserve it in the inventory, then POST; a failed POST
//!    drops the reservation so a later event can retry.

use std::fs;
use std::sync::Arc;

use stackward_core::{
    CompositeKey, DeployedUnit, RemoteTarget, StackLayout, StackRef, TargetIndex,
};
use stackward_remote::RemoteApi;

use crate::diff::unified_diff;
use crate::error::ReconcileError;
use crate::inventory::{Claim, Inventory};

/// What a reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The node directory has no matching remote target.
    UnknownTarget,
    Created,
    Updated,
    /// Remote content already matches the local file exactly.
    Unchanged,
    /// Created earlier in this run but not yet visible remotely.
    Pending,
    /// Dry run: a create would be issued.
    WouldCreate,
    /// Dry run: an update would be issued.
    WouldUpdate,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::UnknownTarget => "unknown-target",
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
            Outcome::Pending => "pending",
            Outcome::WouldCreate => "would-create",
            Outcome::WouldUpdate => "would-update",
        }
    }
}

pub struct Reconciler<R> {
    remote: R,
    targets: TargetIndex,
    inventory: Arc<Inventory>,
    layout: StackLayout,
    dry_run: bool,
}

impl<R: RemoteApi> Reconciler<R> {
    pub fn new(
        remote: R,
        targets: TargetIndex,
        inventory: Arc<Inventory>,
        layout: StackLayout,
    ) -> Self {
        Self {
            remote,
            targets,
            inventory,
            layout,
            dry_run: false,
        }
    }

    /// Compare only; never mutate the remote or the inventory.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn layout(&self) -> &StackLayout {
        &self.layout
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn reconcile(&self, stack: &StackRef) -> Result<Outcome, ReconcileError> {
        let Some(target) = self.targets.get(&stack.node) else {
            tracing::debug!(node = %stack.node, stack = %stack.stack, "no remote target for node");
            return Ok(Outcome::UnknownTarget);
        };
        let key = CompositeKey::new(target.id, &stack.stack);
        let local = self.read_definition(stack)?;

        if self.dry_run {
            return self.plan(stack, &key, &local);
        }

        match self.inventory.claim(&key) {
            Claim::Existing(unit) => {
                tracing::info!(node = %stack.node, stack = %stack.stack, %key, "update stack");
                self.update(stack, target, &key, unit, &local)
            }
            Claim::Reserved => {
                tracing::info!(node = %stack.node, stack = %stack.stack, %key, "create stack");
                self.create(stack, target, &key, &local)
            }
        }
    }

    fn read_definition(&self, stack: &StackRef) -> Result<String, ReconcileError> {
        let path = self.layout.definition_path(stack);
        let bytes = fs::read(&path).map_err(|source| ReconcileError::ReadDefinition {
            stack: stack.clone(),
            path: path.clone(),
            source,
        })?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(err) => {
                tracing::warn!(
                    node = %stack.node,
                    stack = %stack.stack,
                    path = %path.display(),
                    "definition is not valid UTF-8, invalid bytes replaced"
                );
                Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
            }
        }
    }

    fn create(
        &self,
        stack: &StackRef,
        target: &RemoteTarget,
        key: &CompositeKey,
        local: &str,
    ) -> Result<Outcome, ReconcileError> {
        match self.remote.create_unit(target.id, &stack.stack, local) {
            Ok(()) => Ok(Outcome::Created),
            Err(source) => {
                self.inventory.release(key);
                Err(remote_err(stack, "create", source))
            }
        }
    }

    fn update(
        &self,
        stack: &StackRef,
        target: &RemoteTarget,
        key: &CompositeKey,
        unit: DeployedUnit,
        local: &str,
    ) -> Result<Outcome, ReconcileError> {
        let unit = if unit.is_placeholder() {
            match self.resolve_placeholder(stack, key)? {
                Some(unit) => unit,
                None => {
                    tracing::info!(
                        node = %stack.node,
                        stack = %stack.stack,
                        %key,
                        "stack created this run, not yet listed remotely"
                    );
                    return Ok(Outcome::Pending);
                }
            }
        } else {
            unit
        };

        let remote = self
            .remote
            .unit_file(unit.id)
            .map_err(|source| remote_err(stack, "fetch", source))?;
        if remote == local {
            tracing::info!(node = %stack.node, stack = %stack.stack, "skip identical");
            return Ok(Outcome::Unchanged);
        }

        self.remote
            .update_unit(unit.id, target.id, local)
            .map_err(|source| remote_err(stack, "update", source))?;
        Ok(Outcome::Updated)
    }

    /// Look the placeholder's key up in a fresh unit list and upgrade it.
    fn resolve_placeholder(
        &self,
        stack: &StackRef,
        key: &CompositeKey,
    ) -> Result<Option<DeployedUnit>, ReconcileError> {
        let units = self
            .remote
            .list_units()
            .map_err(|source| remote_err(stack, "list stacks for", source))?;
        let found = units
            .into_iter()
            .find(|u| &u.key() == key && !u.is_placeholder());
        if let Some(unit) = &found {
            self.inventory.upgrade(key, unit.clone());
        }
        Ok(found)
    }

    fn plan(
        &self,
        stack: &StackRef,
        key: &CompositeKey,
        local: &str,
    ) -> Result<Outcome, ReconcileError> {
        let unit = match self.inventory.get(key) {
            None => {
                tracing::info!(
                    node = %stack.node,
                    stack = %stack.stack,
                    %key,
                    "would create stack"
                );
                return Ok(Outcome::WouldCreate);
            }
            Some(unit) if unit.is_placeholder() => return Ok(Outcome::Pending),
            Some(unit) => unit,
        };

        let remote = self
            .remote
            .unit_file(unit.id)
            .map_err(|source| remote_err(stack, "fetch", source))?;
        if remote == local {
            return Ok(Outcome::Unchanged);
        }

        let diff = unified_diff(stack, &remote, local);
        tracing::info!(
            node = %stack.node,
            stack = %stack.stack,
            %key,
            "would update stack\n{diff}"
        );
        Ok(Outcome::WouldUpdate)
    }
}

fn remote_err(
    stack: &StackRef,
    action: &'static str,
    source: stackward_remote::RemoteError,
) -> ReconcileError {
    ReconcileError::Remote {
        stack: stack.clone(),
        action,
        source,
    }
}

/// Run one reconciliation on the blocking pool.
pub async fn reconcile_blocking<R>(
    reconciler: Arc<Reconciler<R>>,
    stack: StackRef,
) -> Result<Outcome, ReconcileError>
where
    R: RemoteApi + 'static,
{
    let for_worker = stack.clone();
    tokio::task::spawn_blocking(move || reconciler.reconcile(&for_worker))
        .await
        .map_err(|err| ReconcileError::Worker {
            stack,
            message: err.to_string(),
        })?
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use stackward_core::{index_targets, index_units, RemoteTarget};
    use stackward_remote::{RecordingRemote, RemoteCall};
    use tempfile::TempDir;

    use super::*;

    fn write_stack(root: &Path, node: &str, stack: &str, content: &str) {
        let dir = root.join(node).join(stack);
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("docker-compose.yml"), content).expect("write");
    }

    fn reconciler(
        root: &TempDir,
        remote: Arc<RecordingRemote>,
    ) -> Reconciler<Arc<RecordingRemote>> {
        let targets = index_targets(remote.list_targets().expect("targets"));
        let units = index_units(remote.list_units().expect("units"));
        remote.clear_calls();
        Reconciler::new(
            remote,
            targets,
            Arc::new(Inventory::new(units)),
            StackLayout::new(root.path(), "docker-compose.yml"),
        )
    }

    #[test]
    fn unknown_node_makes_no_remote_calls() {
        let root = TempDir::new().expect("root");
        write_stack(root.path(), "ghost", "app", "x");
        let remote = Arc::new(RecordingRemote::new().with_target(3, "web"));
        let r = reconciler(&root, remote.clone());

        let outcome = r.reconcile(&StackRef::new("ghost", "app")).expect("reconcile");
        assert_eq!(outcome, Outcome::UnknownTarget);
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn missing_definition_file_is_a_read_error() {
        let root = TempDir::new().expect("root");
        fs::create_dir_all(root.path().join("web/app")).expect("mkdir");
        let remote = Arc::new(RecordingRemote::new().with_target(3, "web"));
        let r = reconciler(&root, remote.clone());

        let err = r.reconcile(&StackRef::new("web", "app")).unwrap_err();
        assert!(matches!(err, ReconcileError::ReadDefinition { .. }), "got: {err}");
        assert_eq!(err.stack(), &StackRef::new("web", "app"));
        assert!(remote.calls().is_empty());
        assert!(!r.inventory().contains(&CompositeKey::new(3, "app")));
    }

    #[test]
    fn single_trailing_space_triggers_update_with_pull() {
        let root = TempDir::new().expect("root");
        write_stack(root.path(), "web", "app", "image: nginx \n");
        let remote = Arc::new(
            RecordingRemote::new()
                .with_target(3, "web")
                .with_unit(9, 3, "app", "image: nginx\n"),
        );
        let r = reconciler(&root, remote.clone());

        let outcome = r.reconcile(&StackRef::new("web", "app")).expect("reconcile");
        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(
            remote.updates(),
            vec![RemoteCall::Update {
                unit_id: 9,
                target_id: 3,
                content: "image: nginx \n".to_string(),
                pull_image: true,
            }]
        );
    }

    #[test]
    fn failed_create_releases_reservation() {
        let root = TempDir::new().expect("root");
        write_stack(root.path(), "web", "app", "x");
        let remote = Arc::new(
            RecordingRemote::new()
                .with_target(3, "web")
                .failing_stack("app"),
        );
        let r = reconciler(&root, remote.clone());

        let err = r.reconcile(&StackRef::new("web", "app")).unwrap_err();
        assert!(matches!(err, ReconcileError::Remote { action: "create", .. }));
        assert!(!r.inventory().contains(&CompositeKey::new(3, "app")));
    }

    #[test]
    fn placeholder_upgraded_from_fresh_listing() {
        let root = TempDir::new().expect("root");
        write_stack(root.path(), "web", "app", "v1\n");
        let remote = Arc::new(RecordingRemote::new().with_target(3, "web"));
        let r = reconciler(&root, remote.clone());
        let stack = StackRef::new("web", "app");

        assert_eq!(r.reconcile(&stack).expect("create"), Outcome::Created);
        let reserved = r.inventory().get(&CompositeKey::new(3, "app")).expect("key");
        assert!(reserved.is_placeholder());

        write_stack(root.path(), "web", "app", "v2\n");
        assert_eq!(r.reconcile(&stack).expect("update"), Outcome::Updated);

        let unit = r.inventory().get(&CompositeKey::new(3, "app")).expect("key");
        assert!(!unit.is_placeholder());
        assert_eq!(remote.file(unit.id).as_deref(), Some("v2\n"));
    }

    #[test]
    fn placeholder_not_yet_listed_is_pending() {
        let inventory = Arc::new(Inventory::default());
        inventory.claim(&CompositeKey::new(3, "app"));
        let root = TempDir::new().expect("root");
        write_stack(root.path(), "web", "app", "x");
        let remote = Arc::new(RecordingRemote::new());
        let r = Reconciler::new(
            remote.clone(),
            index_targets(vec![RemoteTarget {
                id: 3,
                name: "web".into(),
            }]),
            inventory,
            StackLayout::new(root.path(), "docker-compose.yml"),
        );

        let outcome = r.reconcile(&StackRef::new("web", "app")).expect("reconcile");
        assert_eq!(outcome, Outcome::Pending);
        assert!(remote.mutations().is_empty());
    }

    #[test]
    fn dry_run_never_mutates() {
        let root = TempDir::new().expect("root");
        write_stack(root.path(), "web", "app", "changed\n");
        write_stack(root.path(), "web", "new", "fresh\n");
        let remote = Arc::new(
            RecordingRemote::new()
                .with_target(3, "web")
                .with_unit(9, 3, "app", "original\n"),
        );
        let r = reconciler(&root, remote.clone()).with_dry_run(true);

        assert_eq!(
            r.reconcile(&StackRef::new("web", "app")).expect("plan app"),
            Outcome::WouldUpdate
        );
        assert_eq!(
            r.reconcile(&StackRef::new("web", "new")).expect("plan new"),
            Outcome::WouldCreate
        );
        assert!(remote.mutations().is_empty());
        assert!(!r.inventory().contains(&CompositeKey::new(3, "new")));
    }

    #[test]
    fn non_utf8_definition_settles_after_one_update() {
        let root = TempDir::new().expect("root");
        let dir = root.path().join("web/app");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("docker-compose.yml"), b"image: caf\xe9\n").expect("write");
        let remote = Arc::new(
            RecordingRemote::new()
                .with_target(3, "web")
                .with_unit(9, 3, "app", "image: nginx\n"),
        );
        let r = reconciler(&root, remote.clone());
        let stack = StackRef::new("web", "app");

        assert_eq!(r.reconcile(&stack).expect("first pass"), Outcome::Updated);
        assert_eq!(r.reconcile(&stack).expect("second pass"), Outcome::Unchanged);
        assert_eq!(r.reconcile(&stack).expect("third pass"), Outcome::Unchanged);

        assert_eq!(remote.updates().len(), 1);
        assert_eq!(remote.file(9).as_deref(), Some("image: caf\u{fffd}\n"));
    }
}
