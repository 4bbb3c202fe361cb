//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Cookie header
//!     → cookie.rs (parse pairs, find the session cookie)
//!     → gate.rs (look up the key in the SessionCache)
//!     → AuthenticatedIdentity | sign-in redirect | Authentication error
//! ```
//!
//! # Design Decisions
//! - Read-only against the cache; TTL and creation belong to the store
//! - Nothing is cached across requests

pub mod cache;
pub mod cookie;
pub mod gate;

pub use cache::{MemorySessionCache, SessionCache, SessionCacheError};
pub use cookie::CookieError;
pub use gate::{AuthenticatedIdentity, GateOutcome, SessionGate};
