//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（Redis, Blob storage, 認証/ロケール, i18n）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - コラボレーターは名前で探さず、型付きの参照をコンストラクタで注入する
//! - ワーカーからはアンビエントな状態を読まない

pub mod clock;
pub mod context;
pub mod hooks;
pub mod id_generator;
pub mod station;
pub mod status_store;
pub mod translator;
pub mod upload;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::context::ContextProvider;
pub use self::hooks::TaskHooks;
pub use self::id_generator::{KeyGenerator, UlidKeyGenerator};
pub use self::station::TransactionStation;
pub use self::status_store::StatusStore;
pub use self::translator::{EXPORT_COUNT_LIMIT, Translator};
pub use self::upload::{FileUpload, MemoryUpload, UploadSource};
