//! StatusBoard - タスク状態のキー・プロトコル
//!
//! Wraps a `StatusStore` with the TTL policy and the JSON encoding of
//! `TaskResult`:
//! - `open`: RUNNING with the long TTL; failure aborts the submission.
//! - `close`: DONE/FAILED with the short TTL; failure is only logged.
//! - `lookup`: never fails; absent reads as EXPIRED, unreadable as FAILED.
//!
//! A RUNNING entry whose TTL lapses before the worker finishes reads as
//! EXPIRED, and flips to the terminal result once the worker writes it. That
//! window is not closed here.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::config::StatusConfig;
use crate::domain::errors::ImexError;
use crate::domain::ids::TaskKey;
use crate::domain::result::TaskResult;
use crate::ports::StatusStore;

#[derive(Clone)]
pub struct StatusBoard {
    store: Arc<dyn StatusStore>,
    running_ttl: Duration,
    result_ttl: Duration,
}

impl StatusBoard {
    pub fn new(store: Arc<dyn StatusStore>, config: &StatusConfig) -> Self {
        Self {
            store,
            running_ttl: config.running_ttl(),
            result_ttl: config.result_ttl(),
        }
    }

    /// Record a freshly minted task as RUNNING.
    pub fn open(&self, key: &TaskKey) -> Result<(), ImexError> {
        let not_created = |reason: String| ImexError::TaskNotCreated {
            key: key.clone(),
            reason,
        };

        let value = serde_json::to_string(&TaskResult::running())?;
        match self.store.set(key.as_str(), &value, self.running_ttl) {
            Ok(true) => {
                debug!(task_key = %key, "task opened");
                Ok(())
            }
            Ok(false) => Err(not_created("status store refused the entry".into())),
            Err(e) => Err(not_created(e.to_string())),
        }
    }

    /// Record the terminal result of a task.
    ///
    /// Returns whether the entry was written. A failed write leaves the
    /// RUNNING entry in place until it expires.
    pub fn close(&self, key: &TaskKey, result: &TaskResult) -> bool {
        if !result.is_terminal() {
            warn!(task_key = %key, status = %result.status, "closing task with non-terminal status");
        }

        let value = match serde_json::to_string(result) {
            Ok(value) => value,
            Err(e) => {
                error!(task_key = %key, error = %e, "failed to encode task result");
                return false;
            }
        };

        match self.store.set(key.as_str(), &value, self.result_ttl) {
            Ok(true) => true,
            Ok(false) => {
                error!(task_key = %key, "status store refused the terminal entry");
                false
            }
            Err(e) => {
                error!(task_key = %key, error = %e, "failed to record terminal entry");
                false
            }
        }
    }

    /// Best-effort read of a task's status.
    pub fn lookup(&self, key: &TaskKey) -> TaskResult {
        let raw = match self.store.get(key.as_str()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(task_key = %key, error = %e, "status lookup failed");
                return TaskResult::failed();
            }
        };

        match raw {
            Some(json) if !json.trim().is_empty() => {
                serde_json::from_str(&json).unwrap_or_else(|e| {
                    warn!(task_key = %key, error = %e, "unreadable status entry");
                    TaskResult::failed()
                })
            }
            _ => TaskResult::expired(),
        }
    }
}
