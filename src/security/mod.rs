//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (preflight short-circuit)
//!     → inspection.rs (log scanner agents / attack patterns)
//!     → rate_limit.rs (fixed-window quota per identity:method:path)
//! Outgoing response:
//!     → cors.rs (allow-list headers)
//!     → headers.rs (security header profile)
//! ```
//!
//! # Design Decisions
//! - Inspection observes only; rejection happens in the gate and the limiter
//! - Every response carries the security headers, errors included
//! - No trust in client input: CORS never echoes the request origin

pub mod cors;
pub mod headers;
pub mod inspection;
pub mod rate_limit;

pub use cors::CorsPolicy;
pub use headers::{SecurityHeaderConfig, SecurityHeaders};
pub use rate_limit::{
    ClientIdentity, RateLimitCategory, RateLimitDecision, RateLimitExceeded, RateLimitKey,
    RateLimitPolicy, RateLimiter,
};
