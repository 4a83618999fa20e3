//! TransactionStation port - ファイルの中継所（Blob ストレージ）
//!
//! Exported files are pushed here and handed to the caller as a URL; staged
//! uploads are parked here until a worker pulls them back.
//!
//! Backends keep pushed resources only for a bounded grace period and
//! reclaim them out of band. Nothing in this crate relies on a longer
//! retention than that.

use std::io::Read;

use crate::domain::errors::StationError;
use crate::domain::resource::StationResource;

/// Pluggable durable storage used as a hand-off point.
pub trait TransactionStation: Send + Sync {
    /// Open a previously pushed resource.
    fn pull(&self, key: &str) -> Result<Box<dyn Read + Send>, StationError>;

    /// Store `resource` and return its backend-relative path.
    ///
    /// The reader inside `resource` is consumed and dropped before this
    /// returns.
    fn push(&self, resource: StationResource) -> Result<String, StationError>;

    /// Release a resource.
    fn delete(&self, key: &str) -> Result<(), StationError>;

    /// Turn a relative path returned by `push` into something a caller can
    /// open. Stations that already return absolute URLs keep the default.
    fn wrap_access_url(&self, relative_path: &str) -> String {
        relative_path.to_string()
    }
}
