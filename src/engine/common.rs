// src/engine/common.rs
//
// Shared helpers for codec work.

use crate::error::{Result, TransformError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Run codec work, turning a panic inside a native codec binding into
/// `InternalPanic` instead of unwinding through the caller.
///
/// `stage` names the operation in the error message and in the log event.
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            warn!(stage, %detail, "codec panicked");
            Err(TransformError::internal_panic(format!("{stage}: {detail}")))
        }
    }
}
