use thiserror::Error;

/// Error surface for the runtime and the change watcher.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Sync(#[from] stackward_sync::SyncError),

    #[error("I/O error in {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

pub(crate) fn io_err(context: &'static str, source: std::io::Error) -> DaemonError {
    DaemonError::Io { context, source }
}

pub(crate) fn join_err(task: &'static str, err: tokio::task::JoinError) -> DaemonError {
    DaemonError::Join {
        task,
        message: err.to_string(),
    }
}
