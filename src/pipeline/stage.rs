//! The stage seam and the built-in stages, in execution order.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{http::Method, response::Response};

use crate::config::RateLimitSettings;
use crate::error::{AppError, AppResult};
use crate::observability::metrics;
use crate::pipeline::RequestContext;
use crate::routing::{Access, RouteTable};
use crate::security::{inspection, ClientIdentity, CorsPolicy, RateLimitKey, RateLimiter};
use crate::session::{AuthenticatedIdentity, GateOutcome, SessionGate};

/// What a stage wants to happen next.
#[derive(Debug)]
pub enum Flow {
    /// Hand the (possibly enriched) context to the next stage.
    Continue,
    /// Stop here and send this response.
    Respond(Response),
}

/// One step of the request pipeline.
///
/// Errors short-circuit to the Error Responder; the context stays with the
/// runner so post-processing can still read what earlier stages recorded.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, ctx: &mut RequestContext) -> AppResult<Flow>;
}

/// Answers every OPTIONS request with the CORS preflight response.
pub struct CorsPreflight {
    policy: CorsPolicy,
}

impl CorsPreflight {
    pub fn new(policy: CorsPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for CorsPreflight {
    fn name(&self) -> &'static str {
        "cors_preflight"
    }

    async fn process(&self, ctx: &mut RequestContext) -> AppResult<Flow> {
        if ctx.method == Method::OPTIONS {
            return Ok(Flow::Respond(self.policy.preflight()));
        }
        Ok(Flow::Continue)
    }
}

/// Logs scanner user agents and attack-shaped URLs. Never rejects.
pub struct Inspect;

#[async_trait]
impl Stage for Inspect {
    fn name(&self) -> &'static str {
        "inspect"
    }

    async fn process(&self, ctx: &mut RequestContext) -> AppResult<Flow> {
        inspection::inspect(&ctx.method, &ctx.uri, &ctx.headers);
        Ok(Flow::Continue)
    }
}

/// Matches (method, path) against the route table.
pub struct ResolveRoute {
    routes: Arc<RouteTable>,
}

impl ResolveRoute {
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self { routes }
    }
}

#[async_trait]
impl Stage for ResolveRoute {
    fn name(&self) -> &'static str {
        "resolve_route"
    }

    async fn process(&self, ctx: &mut RequestContext) -> AppResult<Flow> {
        match self.routes.lookup(&ctx.method, ctx.path()) {
            Some(route) => {
                ctx.route = Some(route);
                Ok(Flow::Continue)
            }
            None => Err(AppError::not_found(format!(
                "Route {} {} not found",
                ctx.method,
                ctx.path()
            ))),
        }
    }
}

/// Runs the Session Gate on protected and optional-session routes.
pub struct Authenticate {
    gate: Arc<SessionGate>,
}

impl Authenticate {
    pub fn new(gate: Arc<SessionGate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "session_gate"
    }

    async fn process(&self, ctx: &mut RequestContext) -> AppResult<Flow> {
        let Some(access) = ctx.route.as_ref().map(|route| route.access) else {
            return Ok(Flow::Continue);
        };

        match access {
            Access::Public => Ok(Flow::Continue),
            Access::Protected => match self.gate.authenticate(&ctx.headers).await? {
                GateOutcome::Authenticated(identity) => {
                    attach(ctx, identity);
                    Ok(Flow::Continue)
                }
                GateOutcome::SignInRequired => Ok(Flow::Respond(self.gate.sign_in_redirect())),
            },
            Access::Optional => {
                match self.gate.authenticate(&ctx.headers).await {
                    Ok(GateOutcome::Authenticated(identity)) => attach(ctx, identity),
                    Ok(GateOutcome::SignInRequired) => {}
                    Err(e) => tracing::debug!(error = %e, "Continuing without identity"),
                }
                Ok(Flow::Continue)
            }
        }
    }
}

fn attach(ctx: &mut RequestContext, identity: AuthenticatedIdentity) {
    tracing::Span::current().record("user_id", identity.user_id);
    ctx.identity = Some(identity);
}

/// Applies the route's quota, keyed by identity, method and path.
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    settings: RateLimitSettings,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>, settings: RateLimitSettings) -> Self {
        Self { limiter, settings }
    }
}

#[async_trait]
impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn process(&self, ctx: &mut RequestContext) -> AppResult<Flow> {
        if !self.settings.enabled {
            return Ok(Flow::Continue);
        }
        let Some(policy) = ctx.route.as_ref().and_then(|route| route.rate_limit) else {
            return Ok(Flow::Continue);
        };
        let category = policy.category_for(ctx.identity.as_ref());

        let identity = ClientIdentity::resolve(ctx.identity.as_ref(), &ctx.headers);
        let key = RateLimitKey::new(identity, ctx.method.clone(), ctx.path());

        match self.limiter.check(&key, self.settings.quota(category)) {
            Ok(decision) => {
                ctx.rate_limit = Some(decision);
                Ok(Flow::Continue)
            }
            Err(exceeded) => {
                metrics::record_rate_limited(category.as_str());
                ctx.rate_limit = Some(exceeded.decision);
                Err(exceeded.into())
            }
        }
    }
}
