//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryStatusStore**: TTL 付きステータスストア（Redis の代わり）
//! - **LocalStation**: ディレクトリを使った TransactionStation
//! - **StaticContext**: 固定の CallContext
//! - **MessageCatalog**: メッセージカタログによる Translator
//!
//! # 本番用実装
//! Redis / Blob ストレージ向けの実装は別クレートに配置します。

pub mod catalog;
pub mod inmem_status;
pub mod local_station;
pub mod static_context;

// 主要な型を再エクスポート
pub use self::catalog::MessageCatalog;
pub use self::inmem_status::InMemoryStatusStore;
pub use self::local_station::LocalStation;
pub use self::static_context::StaticContext;
