//! Error types for the watch subsystem.

use thiserror::Error;

use crate::command::ExecError;
use crate::paths::PathError;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watch source: {reason}")]
    InitFailed { reason: String },

    /// The watch source refused the path: watch limit reached or the
    /// directory is gone.
    #[error("Cannot watch {path}: {reason}")]
    WatchFailed { path: String, reason: String },

    #[error(transparent)]
    ResourceUnavailable(#[from] PathError),

    #[error("Unable to read the event queue: {reason}")]
    StreamRead { reason: String },

    #[error("Unable to execute the command: {0}")]
    Exec(#[from] ExecError),

    #[error("Unrecognized event '{name}'")]
    UnknownEvent { name: String },
}

impl WatchError {
    /// Whether the dispatcher must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WatchError::StreamRead { .. } | WatchError::Exec(_) | WatchError::InitFailed { .. }
        )
    }
}
