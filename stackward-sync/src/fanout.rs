//! Concurrent reconciliation of every discovered `(node, stack)` pair.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use stackward_core::config::PROGRESS_INTERVAL;
use stackward_core::StackRef;
use stackward_remote::RemoteApi;

use crate::error::{ReconcileError, SyncError};
use crate::reconcile::{reconcile_blocking, Outcome, Reconciler};

/// Tally of one fan-out pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutSummary {
    pub outcomes: BTreeMap<&'static str, usize>,
    pub failed: Vec<StackRef>,
    pub duration: Duration,
}

impl FanoutSummary {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(outcome.label()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.outcomes.values().sum::<usize>() + self.failed.len()
    }

    fn record(&mut self, result: Result<Outcome, ReconcileError>) {
        match result {
            Ok(outcome) => *self.outcomes.entry(outcome.label()).or_default() += 1,
            Err(err) => self.failed.push(err.stack().clone()),
        }
    }
}

/// Best-effort counters for the periodic status line.
#[derive(Debug, Default)]
struct Progress {
    done: AtomicUsize,
    total: AtomicUsize,
}

type StackResult = Result<Outcome, ReconcileError>;

/// Reconcile every stack under every node directory.
///
/// One task per node lists that node's stacks; one task per stack runs the
/// reconciler. Failures are logged per pair and never stop the pass. Only an
/// unreadable root is fatal.
pub async fn reconcile_all<R>(
    reconciler: Arc<Reconciler<R>>,
) -> Result<FanoutSummary, SyncError>
where
    R: RemoteApi + 'static,
{
    let layout = reconciler.layout().clone();
    let nodes = tokio::task::spawn_blocking(move || layout.nodes())
        .await
        .map_err(|err| SyncError::Join {
            task: "scan",
            message: err.to_string(),
        })??;

    let progress = Arc::new(Progress::default());
    let started = Instant::now();

    let node_handles: Vec<JoinHandle<Vec<StackResult>>> = nodes
        .into_iter()
        .map(|node| {
            progress.total.fetch_add(1, Ordering::Relaxed);
            tokio::spawn(reconcile_node(reconciler.clone(), node, progress.clone()))
        })
        .collect();

    tracing::info!("waiting for all stacks to be deployed");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let reporter = tokio::spawn(report_progress(progress.clone(), stop_rx));

    let mut summary = FanoutSummary::default();
    for handle in node_handles {
        match handle.await {
            Ok(results) => results.into_iter().for_each(|r| summary.record(r)),
            Err(err) => tracing::error!(error = %err, "node task failed"),
        }
    }

    let _ = stop_tx.send(());
    let _ = reporter.await;

    summary.duration = started.elapsed();
    tracing::info!(
        elapsed = ?summary.duration,
        total = summary.total(),
        failed = summary.failed.len(),
        "all stacks deployed"
    );
    Ok(summary)
}

async fn reconcile_node<R>(
    reconciler: Arc<Reconciler<R>>,
    node: String,
    progress: Arc<Progress>,
) -> Vec<StackResult>
where
    R: RemoteApi + 'static,
{
    let layout = reconciler.layout().clone();
    let listed = {
        let node = node.clone();
        tokio::task::spawn_blocking(move || layout.stacks(&node)).await
    };
    let stacks = match listed {
        Ok(Ok(stacks)) => stacks,
        Ok(Err(err)) => {
            tracing::warn!(node = %node, error = %err, "skipping node");
            progress.done.fetch_add(1, Ordering::Relaxed);
            return Vec::new();
        }
        Err(err) => {
            tracing::warn!(node = %node, error = %err, "node scan task failed");
            progress.done.fetch_add(1, Ordering::Relaxed);
            return Vec::new();
        }
    };

    let handles: Vec<_> = stacks
        .into_iter()
        .map(|stack| {
            progress.total.fetch_add(1, Ordering::Relaxed);
            let stack = StackRef::new(node.clone(), stack);
            let reconciler = reconciler.clone();
            let progress = progress.clone();
            let task_stack = stack.clone();
            let handle = tokio::spawn(async move {
                let stack = task_stack;
                let result = reconcile_blocking(reconciler, stack.clone()).await;
                match &result {
                    Ok(outcome) => {
                        tracing::debug!(%stack, outcome = outcome.label(), "reconciled");
                    }
                    Err(err) => tracing::error!(
                        node = %stack.node,
                        stack = %stack.stack,
                        error = %err,
                        "reconcile failed"
                    ),
                }
                progress.done.fetch_add(1, Ordering::Relaxed);
                result
            });
            (stack, handle)
        })
        .collect();
    progress.done.fetch_add(1, Ordering::Relaxed);

    let mut results = Vec::with_capacity(handles.len());
    for (stack, handle) in handles {
        let result = handle.await.unwrap_or_else(|err| {
            Err(ReconcileError::Worker {
                stack,
                message: err.to_string(),
            })
        });
        results.push(result);
    }
    results
}

async fn report_progress(progress: Arc<Progress>, mut stop: oneshot::Receiver<()>) {
    let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => {
                tracing::info!(
                    "status: {}/{}",
                    progress.done.load(Ordering::Relaxed),
                    progress.total.load(Ordering::Relaxed),
                );
            }
        }
    }
}
