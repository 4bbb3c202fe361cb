//! Turns a panic inside the pipeline into an `Internal` error.

use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::error::{AppError, AppResult};
use crate::lifecycle::crash;

const GUARD_SITE: &str = "captured at panic guard, not at the panic site";

/// Await `future`, converting an unwinding panic into `AppError::Internal`.
///
/// Only unwinding panics are caught; `panic = "abort"` builds still abort.
/// The error's stack is the one the panic hook saw at the panic site; without
/// the hook installed it falls back to a capture taken here, labelled as such.
pub async fn guarded<F, T>(future: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = format!("Handler panicked: {}", panic_message(payload.as_ref()));
            let stack = crash::take_panic_backtrace()
                .unwrap_or_else(|| format!("{GUARD_SITE}\n{}", Backtrace::force_capture()));
            Err(AppError::internal_with_stack(message, stack))
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
