//! Route table: exact (method, path) lookup.
//!
//! # Design Decisions
//! - Immutable once handed to the gateway
//! - O(1) lookup via HashMap keyed on the literal path
//! - A known path with the wrong method is a plain miss (404), no 405

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use crate::routing::route::{Access, Handler, Route};
use crate::security::{RateLimitCategory, RateLimitPolicy};

#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    routes: HashMap<String, HashMap<Method, Arc<Route>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route, replacing any earlier route on the same method and path.
    pub fn insert(&mut self, route: Route) {
        let by_method = self.routes.entry(route.path.clone()).or_default();
        if let Some(previous) = by_method.insert(route.method.clone(), Arc::new(route)) {
            tracing::warn!(
                method = %previous.method,
                path = %previous.path,
                "Route registered twice, keeping the later definition"
            );
        }
    }

    pub fn route(mut self, route: Route) -> Self {
        self.insert(route);
        self
    }

    pub fn public(
        self,
        method: Method,
        path: &str,
        rate_limit: Option<RateLimitCategory>,
        handler: impl Handler + 'static,
    ) -> Self {
        let mut route = Route::new(method, path, Access::Public, handler);
        route.rate_limit = rate_limit.map(RateLimitPolicy::Fixed);
        self.route(route)
    }

    pub fn protected(
        self,
        method: Method,
        path: &str,
        rate_limit: Option<RateLimitCategory>,
        handler: impl Handler + 'static,
    ) -> Self {
        let mut route = Route::new(method, path, Access::Protected, handler);
        route.rate_limit = rate_limit.map(RateLimitPolicy::Fixed);
        self.route(route)
    }

    /// Fold `other` into `self`; on collisions `other` wins.
    pub fn merge(mut self, other: RouteTable) -> Self {
        for by_method in other.routes.into_values() {
            for route in by_method.into_values() {
                let route = Arc::try_unwrap(route).unwrap_or_else(|shared| (*shared).clone());
                self.insert(route);
            }
        }
        self
    }

    /// Exact match on method and path.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<Arc<Route>> {
        self.routes.get(path)?.get(method).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
