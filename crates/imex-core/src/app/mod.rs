//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **ImexHandlerBuilder**: ハンドラーの構築とワイヤリング
//! - **ImexHandler**: upload / download / status の入口
//! - **TaskExecutor**: 有界キュー付きワーカープール（溢れたら最古を破棄）
//! - **StatusBoard**: RUNNING → DONE/FAILED のキー・プロトコル
//! - **TempStore**: エクスポート用の一時ファイル

pub mod builder;
pub mod config;
pub mod executor;
pub mod handler;
pub mod status;
pub mod temp;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ImexHandlerBuilder};
pub use self::config::{ConfigError, ExecutorConfig, ExportConfig, ImexConfig, StatusConfig};
pub use self::executor::{PoolStats, TaskExecutor, TaskExecutorBuilder, TaskHandle};
pub use self::handler::ImexHandler;
pub use self::status::StatusBoard;
pub use self::temp::{TempArtifact, TempStore};
