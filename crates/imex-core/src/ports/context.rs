//! ContextProvider port - 呼び出し元コンテキスト（tenant / language / user）
//!
//! Only ever called on the submitting thread. Workers get the captured copy
//! through `TaskParam` and never call back into the provider.

use crate::domain::param::CallContext;

pub trait ContextProvider: Send + Sync {
    fn current(&self) -> CallContext;
}

impl<F> ContextProvider for F
where
    F: Fn() -> CallContext + Send + Sync,
{
    fn current(&self) -> CallContext {
        self()
    }
}
