//! ImexHandlerBuilder - ハンドラーの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::path::PathBuf;
use std::sync::Arc;

use super::config::{ConfigError, ImexConfig};
use super::executor::TaskExecutor;
use super::handler::{ImexHandler, Pipeline};
use super::status::StatusBoard;
use super::temp::TempStore;
use crate::impls::MessageCatalog;
use crate::ports::{
    Clock, ContextProvider, KeyGenerator, StatusStore, SystemClock, TaskHooks,
    TransactionStation, Translator, UlidKeyGenerator,
};

/// ImexHandlerBuilder は ImexHandler を構築
///
/// # 使用例
/// ```ignore
/// let handler = ImexHandler::builder(Arc::new(OrderHooks))
///     .executor(executor)
///     .status_store(store)
///     .station(station)
///     .context(context)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - executor / status_store / station / context は必須
/// - build() 時に不足分をまとめて BuildError で返す
/// - translator / clock / keys / temp は省略時に既定値を使う
pub struct ImexHandlerBuilder {
    hooks: Arc<dyn TaskHooks>,
    config: ImexConfig,
    executor: Option<Arc<TaskExecutor>>,
    store: Option<Arc<dyn StatusStore>>,
    station: Option<Arc<dyn TransactionStation>>,
    context: Option<Arc<dyn ContextProvider>>,
    translator: Option<Arc<dyn Translator>>,
    clock: Option<Arc<dyn Clock>>,
    keys: Option<Arc<dyn KeyGenerator>>,
    temp_dir: Option<PathBuf>,
}

/// BuildError はハンドラー構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing collaborators: {0:?}")]
    MissingCollaborators(Vec<&'static str>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ImexHandler {
    pub fn builder(hooks: Arc<dyn TaskHooks>) -> ImexHandlerBuilder {
        ImexHandlerBuilder::new(hooks)
    }
}

impl ImexHandlerBuilder {
    pub fn new(hooks: Arc<dyn TaskHooks>) -> Self {
        Self {
            hooks,
            config: ImexConfig::default(),
            executor: None,
            store: None,
            station: None,
            context: None,
            translator: None,
            clock: None,
            keys: None,
            temp_dir: None,
        }
    }

    pub fn config(mut self, config: ImexConfig) -> Self {
        self.config = config;
        self
    }

    /// 共有ワーカープール（複数ハンドラーで共有してよい）
    pub fn executor(mut self, executor: Arc<TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn status_store(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn station(mut self, station: Arc<dyn TransactionStation>) -> Self {
        self.station = Some(station);
        self
    }

    pub fn context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn keys(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Overrides `config.export.temp_dir`.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// 検証してから ImexHandler を生成
    ///
    /// # 検証
    /// - config.validate()
    /// - 必須コラボレーターが全て揃っているか
    pub fn build(self) -> Result<ImexHandler, BuildError> {
        self.config.validate()?;

        let mut missing = Vec::new();
        if self.executor.is_none() {
            missing.push("executor");
        }
        if self.store.is_none() {
            missing.push("status_store");
        }
        if self.station.is_none() {
            missing.push("station");
        }
        if self.context.is_none() {
            missing.push("context");
        }

        let (Some(executor), Some(store), Some(station), Some(context)) =
            (self.executor, self.store, self.station, self.context)
        else {
            return Err(BuildError::MissingCollaborators(missing));
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let keys = self.keys.unwrap_or_else(|| {
            Arc::new(UlidKeyGenerator::new(
                self.config.status.key_prefix.clone(),
                Arc::clone(&clock),
            ))
        });
        let translator = self
            .translator
            .unwrap_or_else(|| Arc::new(MessageCatalog::new()));
        let temp_dir = self
            .temp_dir
            .unwrap_or_else(|| self.config.export.temp_dir.clone());

        let pipeline = Pipeline {
            hooks: self.hooks,
            board: StatusBoard::new(store, &self.config.status),
            station,
            temp: Arc::new(TempStore::new(temp_dir, clock)),
            translator,
        };

        Ok(ImexHandler {
            pipeline: Arc::new(pipeline),
            executor,
            context,
            keys,
        })
    }
}
