//! Process-wide failure handling.
//!
//! Panics inside a request are caught by the pipeline guard and answered with
//! a 500. The HTTP server task and the background tasks are supervised: one
//! that dies by panic takes the process down with exit code 1.
//!
//! Per-connection tasks spawned by axum are not supervised. A panic there
//! (outside the guard, e.g. in a tower layer) is logged by the panic hook and
//! drops only that connection; the server keeps accepting.

use std::backtrace::Backtrace;
use std::cell::RefCell;

use tokio::task::JoinHandle;

use crate::pipeline::guard::panic_message;

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Route panic reports through `tracing` so they land in the structured log.
///
/// The backtrace is also kept on the panicking thread until the pipeline
/// guard picks it up for the `Internal` error it builds.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let backtrace = Backtrace::force_capture().to_string();
        tracing::error!(
            panic = panic_message(info.payload()),
            location = %location,
            backtrace = %backtrace,
            "Panic"
        );
        remember_backtrace(backtrace);
    }));
}

pub(crate) fn remember_backtrace(backtrace: String) {
    PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
}

/// Backtrace of the last panic on this thread, if the hook recorded one.
pub(crate) fn take_panic_backtrace() -> Option<String> {
    PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Await a task. A panic is fatal; a cancelled task yields `None`.
pub async fn join_or_exit<T>(name: &'static str, handle: JoinHandle<T>) -> Option<T> {
    match handle.await {
        Ok(value) => Some(value),
        Err(e) if e.is_panic() => {
            tracing::error!(task = name, "Task panicked, exiting");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::warn!(task = name, error = %e, "Task cancelled");
            None
        }
    }
}

/// Watch a background task; if it panics, log and exit the process.
pub fn supervise(name: &'static str, handle: JoinHandle<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if join_or_exit(name, handle).await.is_some() {
            tracing::debug!(task = name, "Task finished");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_supervised_task_completes() {
        let handle = supervise("noop", tokio::spawn(async {}));
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_join_returns_task_output() {
        let served = join_or_exit("server", tokio::spawn(async { Ok::<u16, String>(8080) })).await;
        assert_eq!(served, Some(Ok(8080)));

        let inner = tokio::spawn(std::future::pending::<u16>());
        inner.abort();
        assert_eq!(join_or_exit("server", inner).await, None);
    }

    #[test]
    fn test_backtrace_is_taken_once() {
        remember_backtrace("0: main".to_string());
        assert_eq!(take_panic_backtrace().as_deref(), Some("0: main"));
        assert_eq!(take_panic_backtrace(), None);
    }

    #[tokio::test]
    async fn test_cancelled_task_does_not_exit() {
        let inner = tokio::spawn(std::future::pending::<()>());
        inner.abort();
        let handle = supervise("aborted", inner);
        assert!(handle.await.is_ok());
    }
}
