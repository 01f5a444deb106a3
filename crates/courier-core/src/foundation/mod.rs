//! Foundation layer: updates, the per-update context and error types.

pub mod context;
pub mod error;
pub mod update;

pub use context::Context;
pub use error::{ApiError, ApiResult, BoxError, UpdatesError};
pub use update::{Update, UpdateKind};
