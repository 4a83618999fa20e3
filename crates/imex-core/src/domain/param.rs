//! Call context captured on the submitting thread.
//!
//! Pool threads are reused across unrelated tasks, so nothing about the
//! caller may be looked up ambiently once the job runs. Everything a hook
//! needs travels inside `TaskParam`.

use serde::{Deserialize, Serialize};

/// Identity of the user who submitted the task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_name: String,
}

impl UserInfo {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
        }
    }
}

/// What a `ContextProvider` knows about the current call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Tenant (mart) code.
    pub mart: String,
    pub language: String,
    pub user: UserInfo,
}

/// Immutable snapshot handed to domain hooks on the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskParam {
    pub mart: String,
    pub language: String,
    pub user: UserInfo,

    /// Export filter (opaque to the orchestrator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<serde_json::Value>,

    /// Optional numeric switch some imports use to pick a variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrance: Option<i32>,
}

impl TaskParam {
    pub fn from_context(context: CallContext) -> Self {
        Self {
            mart: context.mart,
            language: context.language,
            user: context.user,
            query: None,
            entrance: None,
        }
    }

    pub fn with_query(mut self, query: serde_json::Value) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_entrance(mut self, entrance: i32) -> Self {
        self.entrance = Some(entrance);
        self
    }
}

impl From<CallContext> for TaskParam {
    fn from(context: CallContext) -> Self {
        Self::from_context(context)
    }
}
