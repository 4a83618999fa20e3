//! KeyGenerator port - TaskKey 生成の抽象化
//!
//! # 実装
//! - **UlidKeyGenerator**: ULID ベース（本番用）

use crate::domain::ids::TaskKey;
use crate::ports::Clock;
use ulid::Ulid;

/// KeyGenerator は一意な TaskKey を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait KeyGenerator: Send + Sync {
    fn generate_task_key(&self) -> TaskKey;
}

/// ULID based generator.
///
/// The timestamp half comes from the injected clock, the random half from
/// `rand`, so a `FixedClock` still yields distinct keys.
pub struct UlidKeyGenerator<C> {
    prefix: String,
    clock: C,
}

impl<C: Clock> UlidKeyGenerator<C> {
    pub fn new(prefix: impl Into<String>, clock: C) -> Self {
        Self {
            prefix: prefix.into(),
            clock,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl<C: Clock> KeyGenerator for UlidKeyGenerator<C> {
    fn generate_task_key(&self) -> TaskKey {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        TaskKey::new(&self.prefix, ulid)
    }
}
