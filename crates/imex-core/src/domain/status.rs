//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an import/export task as seen by a poller.
///
/// State transitions:
/// - Running -> Done
/// - Running -> Failed
///
/// `Expired` is never written to the store. It is what a lookup reports when
/// the key has no entry (unknown key, or the TTL lapsed).
///
/// The wire form is the integer code, so the stored JSON stays compatible
/// with readers that only know the numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum TaskStatus {
    Running,
    Done,
    Failed,
    Expired,
}

impl TaskStatus {
    pub const fn code(self) -> i32 {
        match self {
            TaskStatus::Running => 1,
            TaskStatus::Done => 2,
            TaskStatus::Failed => -1,
            TaskStatus::Expired => -2,
        }
    }

    /// Terminal states are the ones a worker writes when it finishes.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }

    /// Whether a poller observing `self` may later observe `next`.
    ///
    /// Only `Running -> {Done, Failed}` moves forward; a terminal status never
    /// changes again.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Running, TaskStatus::Done) | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

/// Unknown status code found in a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status code: {0}")]
pub struct UnknownStatusCode(pub i32);

impl TryFrom<i32> for TaskStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(TaskStatus::Running),
            2 => Ok(TaskStatus::Done),
            -1 => Ok(TaskStatus::Failed),
            -2 => Ok(TaskStatus::Expired),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

impl From<TaskStatus> for i32 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Running => "RUNNING",
            TaskStatus::Done => "DONE",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}
