//! Errors - エラー型と分類
//!
//! Only two kinds ever reach a caller:
//! - submission failures (`ImexError` from `upload`/`download`), raised before
//!   a key is handed out;
//! - construction/configuration failures (`BuildError`, `ConfigError`).
//!
//! Everything that goes wrong after a key is returned is turned into a FAILED
//! `TaskResult` on the worker and only logged.

use std::io;

use thiserror::Error;

use super::ids::TaskKey;

/// Top-level error of the orchestrator.
#[derive(Debug, Error)]
pub enum ImexError {
    /// The RUNNING entry could not be written, so no task exists.
    #[error("task {key} could not be created: {reason}")]
    TaskNotCreated { key: TaskKey, reason: String },

    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("status store error: {0}")]
    Store(#[from] StoreError),

    #[error("station error: {0}")]
    Station(#[from] StationError),

    #[error("hook error: {0}")]
    Hook(#[from] HookError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while handing a job to the worker pool.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor is shut down")]
    ShutDown,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// A `TaskHandle` whose job never produced a value: it was discarded from a
/// full queue, dropped at forced shutdown, or it panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("job was cancelled before producing a result")]
pub struct JobCancelled;

/// Failures of the key/value status store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("status store unavailable: {0}")]
    Unavailable(String),

    #[error("status store rejected key {0}")]
    Rejected(String),
}

/// Failures of a transaction station backend.
#[derive(Debug, Error)]
pub enum StationError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid resource key: {0}")]
    InvalidKey(String),

    #[error("station I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("station backend error: {0}")]
    Backend(String),
}

/// Failures raised by domain hooks (parse/write/count).
#[derive(Debug, Error)]
pub enum HookError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl HookError {
    pub fn invalid(message: impl Into<String>) -> Self {
        HookError::InvalidData(message.into())
    }
}

/// Failures inside one asynchronous job. Never leaves the worker.
#[derive(Debug, Error)]
pub(crate) enum JobError {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Station(#[from] StationError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("hook panicked: {0}")]
    Panicked(String),
}
