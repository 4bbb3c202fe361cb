//! Per-request state threaded through the stages.

use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{request::Parts, HeaderMap, Method, Uri},
};

use crate::routing::Route;
use crate::security::RateLimitDecision;
use crate::session::AuthenticatedIdentity;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Empty until every stage has passed.
    pub body: Bytes,
    /// Set by route resolution.
    pub route: Option<Arc<Route>>,
    /// Set by the Session Gate on protected routes.
    pub identity: Option<AuthenticatedIdentity>,
    /// Set by the Rate Limiter; survives a throttle so the 429 carries headers.
    pub rate_limit: Option<RateLimitDecision>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            uri,
            headers,
            body: Bytes::new(),
            route: None,
            identity: None,
            rate_limit: None,
        }
    }

    pub fn from_parts(request_id: impl Into<String>, parts: Parts) -> Self {
        Self::new(request_id, parts.method, parts.uri, parts.headers)
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.identity.map(|identity| identity.user_id)
    }
}
