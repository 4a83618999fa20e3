//! StaticContext - 固定の呼び出し元コンテキスト（CLI・テスト用）

use crate::domain::param::CallContext;
use crate::ports::ContextProvider;

#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    context: CallContext,
}

impl StaticContext {
    pub fn new(context: CallContext) -> Self {
        Self { context }
    }
}

impl ContextProvider for StaticContext {
    fn current(&self) -> CallContext {
        self.context.clone()
    }
}
