//! TaskResult: the value stored under a task key.
//!
//! This module only defines the "shape" of what a poller reads back. The
//! orchestrator never looks inside `BatchResult`; it is produced by domain
//! hooks (or by the export pipeline, which fills in the download URL).

use serde::{Deserialize, Serialize};

use super::status::TaskStatus;

pub const MSG_RUNNING: &str = "running";
pub const MSG_SUCCESS: &str = "success";
pub const MSG_FAILED: &str = "failed";
pub const MSG_EXPIRED: &str = "expired";

/// Pass-through payload of a finished task.
///
/// - `urls`: output locations (an export puts exactly one here).
/// - `detail`: anything else a parse hook wants to report (row counts,
///   rejected lines, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl BatchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_urls(urls: Vec<String>) -> Self {
        Self { urls, detail: None }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Status + payload + message, serialized as `{status, result, msg}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskStatus,

    #[serde(default)]
    pub result: BatchResult,

    #[serde(default)]
    pub msg: String,
}

impl TaskResult {
    pub fn running() -> Self {
        Self::new(TaskStatus::Running, BatchResult::empty(), MSG_RUNNING)
    }

    pub fn done(result: BatchResult) -> Self {
        Self::new(TaskStatus::Done, result, MSG_SUCCESS)
    }

    pub fn failed() -> Self {
        Self::failed_with(MSG_FAILED)
    }

    pub fn failed_with(msg: impl Into<String>) -> Self {
        Self::new(TaskStatus::Failed, BatchResult::empty(), msg)
    }

    pub fn expired() -> Self {
        Self::new(TaskStatus::Expired, BatchResult::empty(), MSG_EXPIRED)
    }

    fn new(status: TaskStatus, result: BatchResult, msg: impl Into<String>) -> Self {
        Self {
            status,
            result,
            msg: msg.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
