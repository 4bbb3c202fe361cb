//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Resolve config → Init logging → Panic hook → Metrics
//!     → Build gateway → Spawn sweeper (supervised) → Serve (supervised)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, sweeper stops → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Crashes (crash.rs):
//!     Panic → logged via tracing, backtrace handed to the pipeline guard
//!     Supervised task panicked → exit(1)
//!     Connection task panicked → logged, connection dropped
//! ```

pub mod crash;
pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
