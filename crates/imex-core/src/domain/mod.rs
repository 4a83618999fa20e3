//! Domain model (keys, statuses, results, call context, errors).

pub mod errors;
pub mod ids;
pub mod param;
pub mod resource;
pub mod result;
pub mod status;

pub use self::errors::{
    ExecutorError, HookError, ImexError, JobCancelled, StationError, StoreError,
};
pub use self::ids::{DEFAULT_KEY_PREFIX, TaskKey};
pub use self::param::{CallContext, TaskParam, UserInfo};
pub use self::resource::StationResource;
pub use self::result::{BatchResult, TaskResult};
pub use self::status::TaskStatus;
