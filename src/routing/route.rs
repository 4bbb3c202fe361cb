//! Route definitions and the handler seam.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{http::Method, response::Response};

use crate::error::AppResult;
use crate::pipeline::RequestContext;
use crate::security::{RateLimitCategory, RateLimitPolicy};

/// Whether a route needs an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    /// Identity is resolved when a valid session is present; callers
    /// without one continue anonymously.
    Optional,
}

/// Terminal request handler.
///
/// Any async closure `Fn(RequestContext) -> Future<Output = AppResult<Response>>`
/// is a handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: RequestContext) -> AppResult<Response>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = AppResult<Response>> + Send + 'static,
{
    async fn call(&self, ctx: RequestContext) -> AppResult<Response> {
        (self)(ctx).await
    }
}

/// A single endpoint.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub access: Access,
    /// Quota policy; `None` means the route is not rate limited.
    pub rate_limit: Option<RateLimitPolicy>,
    pub handler: Arc<dyn Handler>,
}

impl Route {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        access: Access,
        handler: impl Handler + 'static,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            access,
            rate_limit: None,
            handler: Arc::new(handler),
        }
    }

    pub fn limited(mut self, category: RateLimitCategory) -> Self {
        self.rate_limit = Some(RateLimitPolicy::Fixed(category));
        self
    }

    /// Signed-in callers get `authenticated`, everyone else `anonymous`.
    pub fn adaptive(
        mut self,
        authenticated: RateLimitCategory,
        anonymous: RateLimitCategory,
    ) -> Self {
        self.rate_limit = Some(RateLimitPolicy::Adaptive {
            authenticated,
            anonymous,
        });
        self
    }

    pub fn is_protected(&self) -> bool {
        self.access == Access::Protected
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("access", &self.access)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}
