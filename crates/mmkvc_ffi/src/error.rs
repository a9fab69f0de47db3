//! Boundary errors and the panic guard.
//!
//! Nothing here is ever returned to the caller: every export turns an
//! [`FfiError`] into its sentinel (default, `false` or null) after logging
//! it.

use mmkvc_core::CoreError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Result type for boundary helpers.
pub type FfiResult<T> = Result<T, FfiError>;

/// Errors raised while translating one call.
#[derive(Debug, Error)]
pub enum FfiError {
    /// A required pointer argument was null.
    #[error("null {0} argument")]
    NullArgument(&'static str),

    /// A string argument is not valid UTF-8.
    #[error("{0} argument is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// A path cannot be converted to the platform's native encoding.
    #[error("path cannot be represented on this platform: {0}")]
    PathEncoding(String),

    /// The general-purpose allocator returned null.
    #[error("allocation of {0} bytes failed")]
    AllocationFailed(usize),

    /// The engine rejected the call.
    #[error(transparent)]
    Core(#[from] CoreError),
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Runs one export body, mapping errors and panics to `sentinel`.
pub(crate) fn guard<T>(
    export: &'static str,
    sentinel: T,
    body: impl FnOnce() -> FfiResult<T>,
) -> T {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            tracing::warn!(export, error = %err, "call failed, returning sentinel");
            sentinel
        }
        Err(payload) => {
            tracing::error!(
                export,
                panic = panic_message(payload.as_ref()),
                "panic stopped at the C boundary"
            );
            sentinel
        }
    }
}
