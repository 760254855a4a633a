use std::sync::Arc;

use tokio::sync::broadcast;

use stackward_core::{Config, LogFormat, StackLayout};
use stackward_remote::{HttpRemote, RemoteApi};
use stackward_sync::{reconcile_all, FanoutSummary, Outcome, Reconciler, RemoteInventory};

use crate::error::{io_err, join_err, DaemonError};
use crate::watcher::watch_stacks;

/// Build a runtime, run one full pass and, in watch mode, keep watching.
pub fn start_blocking(config: Config) -> Result<FanoutSummary, DaemonError> {
    init_tracing(config.log_format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let remote: Arc<dyn RemoteApi> =
        Arc::new(HttpRemote::new(&config.api_address, &config.api_key));
    runtime.block_on(run(config, remote))
}

/// Fetch the remote inventory, reconcile every pair, then watch if enabled.
///
/// Inventory and root-listing failures are fatal. Per-stack failures are
/// logged inside the pass and reflected only in the returned summary.
pub async fn run(config: Config, remote: Arc<dyn RemoteApi>) -> Result<FanoutSummary, DaemonError> {
    let fetched = {
        let remote = remote.clone();
        tokio::task::spawn_blocking(move || RemoteInventory::fetch(&*remote))
            .await
            .map_err(|err| join_err("inventory", err))??
    };

    let layout = StackLayout::new(config.stacks_dir.clone(), config.stack_file.clone());
    let reconciler = Arc::new(
        Reconciler::new(remote, fetched.targets, Arc::new(fetched.units), layout)
            .with_dry_run(config.dry_run),
    );

    let summary = reconcile_all(reconciler.clone()).await?;
    log_summary(&summary, config.dry_run);

    if config.watch {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(4);
        let signal_handle = tokio::spawn(forward_shutdown_signal(shutdown_tx));
        let result = watch_stacks(reconciler, shutdown_rx).await;
        signal_handle.abort();
        result?;
    }

    Ok(summary)
}

fn log_summary(summary: &FanoutSummary, dry_run: bool) {
    tracing::info!(
        dry_run,
        created = summary.count(Outcome::Created),
        updated = summary.count(Outcome::Updated),
        unchanged = summary.count(Outcome::Unchanged),
        unknown_target = summary.count(Outcome::UnknownTarget),
        pending = summary.count(Outcome::Pending),
        would_create = summary.count(Outcome::WouldCreate),
        would_update = summary.count(Outcome::WouldUpdate),
        failed = summary.failed.len(),
        duration_ms = summary.duration.as_millis() as u64,
        "reconcile pass summary",
    );
    for stack in &summary.failed {
        tracing::warn!(node = %stack.node, stack = %stack.stack, "stack not reconciled this pass");
    }
}

async fn forward_shutdown_signal(shutdown: broadcast::Sender<()>) {
    match wait_for_signal().await {
        Ok(name) => tracing::info!(signal = name, "shutting down watcher"),
        Err(err) => tracing::error!(error = %err, "signal handler failed, shutting down"),
    }
    let _ = shutdown.send(());
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "ctrl-c"),
        _ = terminate.recv() => Ok("terminate"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}

fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
