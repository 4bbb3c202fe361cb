//! Request-processing gateway for the feed application.
//!
//! Every request runs through a fixed pipeline: CORS preflight, inspection,
//! route resolution, Session Gate, Rate Limiter, handler. Errors from any
//! stage are rendered by the Error Responder, and every response leaves with
//! the security, CORS and rate-limit headers applied.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod routing;

// Request-facing components
pub mod handlers;
pub mod security;
pub mod session;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::{AppError, AppResult, ErrorResponder};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::Gateway;
