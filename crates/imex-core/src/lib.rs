//! imex-core
//!
//! Asynchronous import/export orchestration: a caller submits an upload or a
//! download, immediately gets a `TaskKey` back, and polls `status(key)` while
//! a bounded worker pool runs the domain hooks.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskKey, TaskStatus, TaskResult, TaskParam, errors）
//! - **ports**: 抽象化レイヤー（StatusStore, TransactionStation, TaskHooks, Clock, など）
//! - **app**: アプリケーションロジック（executor, handler, status, temp, config, builder）
//! - **impls**: 実装（InMemoryStatusStore, LocalStation など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{
    BuildError, ConfigError, ImexConfig, ImexHandler, ImexHandlerBuilder, TaskExecutor,
};
pub use domain::{
    BatchResult, CallContext, ImexError, StationResource, TaskKey, TaskParam, TaskResult,
    TaskStatus, UserInfo,
};
