//! Built-in handlers and the route table the binary mounts.

pub mod health;
pub mod session;

use std::sync::Arc;

use axum::http::Method;

use crate::pipeline::RequestContext;
use crate::routing::RouteTable;
use crate::security::RateLimitCategory;
use crate::session::SessionGate;

/// Routes reachable without a session.
pub fn public_routes(gate: Arc<SessionGate>) -> RouteTable {
    RouteTable::new()
        .public(Method::GET, "/health", None, health::health)
        .public(
            Method::POST,
            "/Signout",
            Some(RateLimitCategory::Auth),
            move |ctx: RequestContext| session::sign_out(gate.clone(), ctx),
        )
}

/// Routes behind the Session Gate.
pub fn protected_routes() -> RouteTable {
    RouteTable::new().protected(
        Method::GET,
        "/get-user-info",
        Some(RateLimitCategory::General),
        session::current_user,
    )
}

pub fn routes(gate: Arc<SessionGate>) -> RouteTable {
    public_routes(gate).merge(protected_routes())
}
