//! Incremental re-reconciliation driven by filesystem events.
//!
//! Events are handled strictly one at a time in arrival order. Each event path
//! that names a `<node>/<stack>/<file>` triggers one full reconciliation of
//! that pair; there is no debouncing.

use std::path::Path;
use std::sync::Arc;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use stackward_core::stack_for_path;
use stackward_remote::RemoteApi;
use stackward_sync::{reconcile_blocking, Outcome, Reconciler};

use crate::error::DaemonError;

/// Watch the stack root until `shutdown` fires, then unsubscribe.
pub async fn watch_stacks<R>(
    reconciler: Arc<Reconciler<R>>,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), DaemonError>
where
    R: RemoteApi + 'static,
{
    let root = reconciler.layout().root().to_path_buf();

    let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!(path = %root.display(), "watching");

    process_events(reconciler, event_rx, shutdown).await;

    if let Err(err) = watcher.unwatch(&root) {
        tracing::warn!(error = %err, "failed to unwatch stack root");
    }
    tracing::info!(path = %root.display(), "stopped watching");
    Ok(())
}

/// Drain watcher events until shutdown or until the event source closes.
pub(crate) async fn process_events<R>(
    reconciler: Arc<Reconciler<R>>,
    mut event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut shutdown: broadcast::Receiver<()>,
) where
    R: RemoteApi + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                // Reads, including our own reads of definition files, change nothing.
                if matches!(event.kind, EventKind::Access(_)) {
                    continue;
                }
                for path in &event.paths {
                    handle_path(&reconciler, path).await;
                }
            }
        }
    }
}

async fn handle_path<R>(reconciler: &Arc<Reconciler<R>>, path: &Path) -> Option<Outcome>
where
    R: RemoteApi + 'static,
{
    let Some(stack) = stack_for_path(path) else {
        tracing::debug!(path = %path.display(), "skip path");
        return None;
    };

    tracing::info!(node = %stack.node, stack = %stack.stack, "deploy");
    match reconcile_blocking(reconciler.clone(), stack.clone()).await {
        Ok(outcome) => {
            tracing::debug!(%stack, outcome = outcome.label(), "watch reconcile done");
            Some(outcome)
        }
        Err(err) => {
            tracing::error!(
                node = %stack.node,
                stack = %stack.stack,
                error = %err,
                "reconcile failed"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use notify::event::{CreateKind, DataChange, ModifyKind};
    use stackward_core::{index_targets, StackLayout};
    use stackward_remote::{RecordingRemote, RemoteCall};
    use stackward_sync::Inventory;
    use tempfile::TempDir;

    use super::*;

    fn write_stack(root: &Path, node: &str, stack: &str, content: &str) -> PathBuf {
        let dir = root.join(node).join(stack);
        fs::create_dir_all(&dir).expect("mkdir");
        let file = dir.join("docker-compose.yml");
        fs::write(&file, content).expect("write");
        file
    }

    fn reconciler(
        root: &TempDir,
        remote: Arc<RecordingRemote>,
    ) -> Arc<Reconciler<Arc<RecordingRemote>>> {
        let targets = index_targets(remote.list_targets().expect("targets"));
        remote.clear_calls();
        Arc::new(Reconciler::new(
            remote,
            targets,
            Arc::new(Inventory::default()),
            StackLayout::new(root.path(), "docker-compose.yml"),
        ))
    }

    fn modified(path: PathBuf) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path))
    }

    #[tokio::test]
    async fn shallow_paths_are_discarded() {
        let root = TempDir::new().expect("root");
        let remote = Arc::new(RecordingRemote::new().with_target(3, "web"));
        let r = reconciler(&root, remote.clone());

        assert_eq!(handle_path(&r, Path::new("web/app")).await, None);
        assert_eq!(handle_path(&r, Path::new("/app")).await, None);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn events_reconcile_in_order_until_source_closes() {
        let root = TempDir::new().expect("root");
        let file = write_stack(root.path(), "web", "app", "v1\n");
        let remote = Arc::new(RecordingRemote::new().with_target(3, "web"));
        let r = reconciler(&root, remote.clone());

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        event_tx
            .send(Ok(Event::new(EventKind::Create(CreateKind::Folder))
                .add_path(root.path().join("web"))))
            .expect("send");
        event_tx.send(modified(file.clone())).expect("send");
        event_tx
            .send(Ok(Event::new(EventKind::Access(notify::event::AccessKind::Any))
                .add_path(file.clone())))
            .expect("send");
        event_tx.send(modified(file)).expect("send");
        drop(event_tx);

        process_events(r, event_rx, shutdown_rx).await;

        // First event creates; the repeat sees the new unit and finds no change.
        let calls = remote.calls();
        assert_eq!(remote.creates().len(), 1);
        assert!(remote.updates().is_empty());
        assert!(matches!(calls[0], RemoteCall::Create { target_id: 3, .. }));
        assert_eq!(remote.file_reads(), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let root = TempDir::new().expect("root");
        let remote = Arc::new(RecordingRemote::new());
        let r = reconciler(&root, remote);

        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).expect("send shutdown");

        tokio::time::timeout(Duration::from_secs(5), process_events(r, event_rx, shutdown_rx))
            .await
            .expect("loop should stop on shutdown");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn file_edit_on_disk_triggers_create() {
        let root = TempDir::new().expect("root");
        fs::create_dir_all(root.path().join("web/app")).expect("mkdir");
        let remote = Arc::new(RecordingRemote::new().with_target(3, "web"));
        let r = reconciler(&root, remote.clone());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let watch = tokio::spawn(watch_stacks(r, shutdown_rx));
        tokio::time::sleep(Duration::from_millis(300)).await;

        write_stack(root.path(), "web", "app", "services: {}\n");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while remote.creates().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        shutdown_tx.send(()).expect("send shutdown");
        watch.await.expect("join").expect("watch");

        assert_eq!(remote.creates().len(), 1);
    }
}
