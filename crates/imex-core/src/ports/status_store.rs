//! StatusStore port - TTL 付きの key/value ストア（Redis など）
//!
//! The orchestrator only needs two commands:
//! - `SET key value ttl -> bool`
//! - `GET key -> string | absent`
//!
//! Per-key operations are assumed atomic; nothing above this trait locks.

use std::time::Duration;

use crate::domain::errors::StoreError;

/// StatusStore は TaskResult の JSON を TTL 付きで保持
///
/// # 設計原則
/// - `set` の失敗（`Ok(false)` / `Err`）はタスク作成時には致命的
/// - `get` の失敗は「データなし」として扱われ、呼び出し側に伝播しない
pub trait StatusStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, and expire it
    /// after `ttl`. Returns whether the store accepted the write.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Read the live value of `key`; `None` when absent or expired.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
}
