//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → gateway.rs (request id, span, context)
//!     → stage.rs, in order:
//!         cors_preflight → inspect → resolve_route → session_gate → rate_limit
//!     → handler (body read under the size limit, panics caught by guard.rs)
//!     → on error: ErrorResponder
//!     → post-processing: rate-limit, CORS and security headers, metrics
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Stage order is fixed at build time and inspectable (`stage_names`)
//! - Stages borrow the context mutably; a failing stage leaves its
//!   findings behind for post-processing
//! - The body is only buffered once every stage has passed

pub mod context;
pub mod gateway;
pub mod guard;
pub mod stage;

pub use context::RequestContext;
pub use gateway::{BuildError, Gateway, GatewayBuilder};
pub use stage::{Flow, Stage};
