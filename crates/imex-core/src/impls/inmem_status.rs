//! InMemoryStatusStore - 開発用の TTL 付きステータスストア
//!
//! # 学習ポイント
//! - Mutex による排他制御（Redis の SET EX / GET の代わり）
//! - Clock 注入による TTL のテスト容易性
//! - 期限切れエントリの遅延削除

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::errors::StoreError;
use crate::ports::{Clock, StatusStore};

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// InMemoryStatusStore は開発用のステータスストア
///
/// # 実装詳細
/// - HashMap<String, Entry> をひとつの Mutex で保護
/// - 期限は注入された Clock で判定
/// - 期限切れは get 時、または purge_expired() で削除
pub struct InMemoryStatusStore<C> {
    entries: Mutex<HashMap<String, Entry>>,
    clock: C,
}

impl<C: Clock> InMemoryStatusStore<C> {
    pub fn new(clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "purged expired status entries");
        }
        purged
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock> StatusStore for InMemoryStatusStore<C> {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| StoreError::Rejected(format!("{key}: TTL out of range")))?;
        let expires_at = self.clock.now() + ttl;

        self.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
