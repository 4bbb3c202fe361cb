//! The request composer: stages in a fixed order, then the handler, then
//! post-processing that every response goes through.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request},
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult, ErrorResponder};
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;
use crate::pipeline::guard::guarded;
use crate::pipeline::stage::{Authenticate, CorsPreflight, Flow, Inspect, RateLimit, ResolveRoute, Stage};
use crate::pipeline::RequestContext;
use crate::routing::RouteTable;
use crate::security::cors::InvalidCorsConfig;
use crate::security::{CorsPolicy, RateLimiter, SecurityHeaderConfig, SecurityHeaders};
use crate::session::SessionGate;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Cors(#[from] InvalidCorsConfig),
}

pub struct Gateway {
    stages: Vec<Box<dyn Stage>>,
    cors: CorsPolicy,
    security: SecurityHeaders,
    responder: ErrorResponder,
    limiter: Arc<RateLimiter>,
    max_body_size: usize,
}

impl Gateway {
    pub fn builder(config: GatewayConfig, gate: Arc<SessionGate>) -> GatewayBuilder {
        GatewayBuilder {
            config,
            gate,
            routes: RouteTable::new(),
            limiter: None,
            security: None,
        }
    }

    /// Names of the stages in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one request through the pipeline. Never fails: every error
    /// becomes a response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let (parts, body) = request.into_parts();
        let request_id = request_id(&parts.headers);
        let mut ctx = RequestContext::from_parts(request_id, parts);
        let method = ctx.method.clone();
        let path = ctx.path().to_owned();

        let span = tracing::info_span!(
            "request",
            request_id = %ctx.request_id,
            method = %method,
            path = %path,
            user_id = tracing::field::Empty,
        );

        async move {
            let mut response = match guarded(self.run(&mut ctx, body)).await {
                Ok(response) => response,
                Err(error) => self.responder.respond(error, &method, &path),
            };

            self.finish(&ctx, &mut response);
            metrics::record_request(method.as_str(), response.status().as_u16(), start);
            tracing::debug!(
                status = response.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn run(&self, ctx: &mut RequestContext, body: Body) -> AppResult<Response> {
        for stage in &self.stages {
            if let Flow::Respond(response) = stage.process(ctx).await? {
                tracing::debug!(stage = stage.name(), "Stage answered the request");
                return Ok(response);
            }
        }

        let route = ctx
            .route
            .clone()
            .ok_or_else(|| AppError::internal("Request reached the handler without a route"))?;

        ctx.body = to_bytes(body, self.max_body_size).await.map_err(|_| {
            AppError::validation(
                "Request body too large",
                [("body", format!("must not exceed {} bytes", self.max_body_size))],
            )
        })?;

        route.handler.call(ctx.clone()).await
    }

    /// Headers every response carries, whichever path produced it.
    fn finish(&self, ctx: &RequestContext, response: &mut Response) {
        let headers = response.headers_mut();
        if let Some(decision) = &ctx.rate_limit {
            decision.apply(headers);
        }
        self.cors.apply_to(headers);
        self.security.apply_to(headers);
        if let Ok(value) = ctx.request_id.parse() {
            headers.insert(X_REQUEST_ID, value);
        }
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Assembles a [`Gateway`]; collaborators are injected so tests can swap them.
pub struct GatewayBuilder {
    config: GatewayConfig,
    gate: Arc<SessionGate>,
    routes: RouteTable,
    limiter: Option<Arc<RateLimiter>>,
    security: Option<SecurityHeaderConfig>,
}

impl GatewayBuilder {
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Override the environment's security header profile.
    pub fn security_headers(mut self, config: SecurityHeaderConfig) -> Self {
        self.security = Some(config);
        self
    }

    pub fn build(self) -> Result<Gateway, BuildError> {
        let environment = self.config.environment;
        let cors = CorsPolicy::from_config(&self.config.cors, environment)?;
        let security = match &self.security {
            Some(config) => SecurityHeaders::compile(config),
            None => SecurityHeaders::for_environment(environment),
        };
        let limiter = self.limiter.unwrap_or_default();

        tracing::info!(
            environment = %environment,
            routes = self.routes.len(),
            rate_limiting = self.config.rate_limit.enabled,
            "Gateway assembled"
        );

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(CorsPreflight::new(cors.clone())),
            Box::new(Inspect),
            Box::new(ResolveRoute::new(Arc::new(self.routes))),
            Box::new(Authenticate::new(self.gate)),
            Box::new(RateLimit::new(limiter.clone(), self.config.rate_limit)),
        ];

        Ok(Gateway {
            stages,
            cors,
            security,
            responder: ErrorResponder::new(environment),
            limiter,
            max_body_size: self.config.listener.max_body_size,
        })
    }
}
