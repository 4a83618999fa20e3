//! Task keys.
//!
//! A `TaskKey` is the only handle shared between the submitter and the poller.
//! It is minted once per submission and stored verbatim in the status store,
//! so its textual form must survive a round trip unchanged.
//!
//! # 形式
//! - `<PREFIX>:TASK:<ULID>`（例: `IMEX:TASK:01HV4Z...`）
//! - ULID の先頭は時刻なので、生成順にソートできる

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Default namespace written in front of every key.
pub const DEFAULT_KEY_PREFIX: &str = "IMEX";

const TASK_SEGMENT: &str = "TASK";

/// Opaque, namespaced task handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(String);

impl TaskKey {
    /// Build a key from a namespace and a ULID.
    pub fn new(prefix: &str, ulid: Ulid) -> Self {
        Self(format!("{prefix}:{TASK_SEGMENT}:{ulid}"))
    }

    /// Wrap a key received from a caller (e.g. a poll request).
    ///
    /// No validation happens here: an unknown key simply reads as expired.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The random identifier part, when the key was minted by this crate.
    pub fn ulid(&self) -> Option<Ulid> {
        let (_, id) = self.0.rsplit_once(':')?;
        Ulid::from_string(id).ok()
    }

    /// The namespace part, when the key has the `<PREFIX>:TASK:<id>` shape.
    pub fn prefix(&self) -> Option<&str> {
        let (head, _) = self.0.rsplit_once(':')?;
        head.strip_suffix(TASK_SEGMENT)?.strip_suffix(':')
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for TaskKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}
