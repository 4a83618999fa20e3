//! TaskHooks - タスク種別ごとのドメインロジック
//!
//! One value per task type bundles everything the pipelines delegate:
//! parsing an uploaded file, writing an export, and the optional row-count
//! guard in front of an export. The orchestrator owns every other step.
//!
//! # 使用例
//! ```ignore
//! struct OrderHooks;
//!
//! impl TaskHooks for OrderHooks {
//!     fn name(&self) -> &str { "orders" }
//!
//!     fn parse(&self, input: &mut dyn Read, param: &TaskParam) -> Result<TaskResult, HookError> {
//!         let rows = read_rows(input)?;
//!         Ok(TaskResult::done(BatchResult::empty().with_detail(json!({"rows": rows}))))
//!     }
//!
//!     fn write(&self, output: &mut dyn Write, param: &TaskParam) -> Result<(), HookError> {
//!         write_rows(output, param.query.as_ref())
//!     }
//!
//!     fn count_limit(&self) -> Option<u64> { Some(50_000) }
//!     fn count(&self, param: &TaskParam) -> Result<u64, HookError> { count_rows(param) }
//! }
//! ```

use std::io::{Read, Write};

use crate::domain::errors::HookError;
use crate::domain::param::TaskParam;
use crate::domain::result::TaskResult;

/// Capability bundle of one import/export task type.
pub trait TaskHooks: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Parse an uploaded file into a result.
    ///
    /// The returned result is stored as-is, so a hook may report `FAILED`
    /// with its own message (e.g. validation errors) without returning `Err`.
    fn parse(&self, input: &mut dyn Read, param: &TaskParam) -> Result<TaskResult, HookError>;

    /// Write the export for `param` into `output`.
    fn write(&self, output: &mut dyn Write, param: &TaskParam) -> Result<(), HookError>;

    /// Row-count threshold for exports. `None` disables the guard.
    fn count_limit(&self) -> Option<u64> {
        None
    }

    /// Number of rows the export for `param` would produce.
    /// Only called when `count_limit` is `Some`.
    fn count(&self, _param: &TaskParam) -> Result<u64, HookError> {
        Ok(0)
    }

    /// Whether a staged upload is deleted from the station once parsed.
    fn clear_station_resource(&self) -> bool {
        true
    }
}
