//! Shared fixtures for the gateway integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use feed_gateway::config::{Environment, GatewayConfig, RateLimitConfig};
use feed_gateway::error::{AppError, AppResult};
use feed_gateway::handlers;
use feed_gateway::lifecycle::Shutdown;
use feed_gateway::pipeline::{Gateway, RequestContext};
use feed_gateway::routing::{Access, Route, RouteTable};
use feed_gateway::security::{RateLimitCategory, RateLimiter};
use feed_gateway::session::{MemorySessionCache, SessionCache, SessionCacheError, SessionGate};
use feed_gateway::HttpServer;

/// Session key seeded for user 42 in every fixture.
pub const SESSION: &str = "sess-42";
pub const USER_ID: i64 = 42;

pub struct Fixture {
    pub gateway: Arc<Gateway>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<MemorySessionCache>,
}

/// Test config: auth quota 5 per minute, content creation 2 per 200 ms.
pub fn test_config(environment: Environment) -> GatewayConfig {
    let mut config = GatewayConfig {
        environment,
        ..GatewayConfig::default()
    };
    config.rate_limit.auth = RateLimitConfig::new(
        60_000,
        5,
        "Too many authentication attempts, please try again later.",
    );
    config.rate_limit.content_creation = RateLimitConfig::new(
        200,
        2,
        "Too many content creation attempts, please try again later.",
    );
    config.listener.max_body_size = 1024;
    config
}

async fn sign_in(ctx: RequestContext) -> AppResult<Response> {
    Ok(Json(json!({ "echo": ctx.body.len() })).into_response())
}

async fn who_am_i(ctx: RequestContext) -> AppResult<Response> {
    Ok(Json(json!({ "userId": ctx.user_id() })).into_response())
}

async fn create_post(_ctx: RequestContext) -> AppResult<Response> {
    Ok((axum::http::StatusCode::CREATED, Json(json!({ "created": true }))).into_response())
}

async fn broken(_ctx: RequestContext) -> AppResult<Response> {
    Err(AppError::unexpected(std::io::Error::other(
        "connection pool exhausted",
    )))
}

async fn panics(_ctx: RequestContext) -> AppResult<Response> {
    panic!("feed index out of bounds");
}

async fn taken(_ctx: RequestContext) -> AppResult<Response> {
    Err(AppError::conflict("Username already taken"))
}

pub fn test_routes() -> RouteTable {
    let public = RouteTable::new()
        .public(Method::POST, "/Signin", Some(RateLimitCategory::Auth), sign_in)
        .public(Method::POST, "/Signup", Some(RateLimitCategory::Auth), taken)
        .public(Method::GET, "/broken", None, broken)
        .public(Method::GET, "/panic", None, panics)
        .route(
            Route::new(Method::GET, "/get-feed", Access::Optional, who_am_i)
                .adaptive(RateLimitCategory::General, RateLimitCategory::Auth),
        );
    let protected = RouteTable::new()
        .protected(Method::GET, "/get-user-info", Some(RateLimitCategory::General), who_am_i)
        .protected(
            Method::POST,
            "/create-post",
            Some(RateLimitCategory::ContentCreation),
            create_post,
        );
    public.merge(protected)
}

pub fn fixture(environment: Environment) -> Fixture {
    fixture_with(test_config(environment))
}

pub fn fixture_with(config: GatewayConfig) -> Fixture {
    let cache = Arc::new(MemorySessionCache::new());
    cache.insert(SESSION, [("userId", USER_ID.to_string())]);
    cache.insert("sess-no-user", [("email", "a@b.c")]);
    cache.insert("sess-bad-user", [("userId", "forty-two")]);

    let gate = Arc::new(SessionGate::new(cache.clone(), &config.session));
    let limiter = Arc::new(RateLimiter::new());
    let gateway = Gateway::builder(config, gate)
        .routes(test_routes())
        .limiter(limiter.clone())
        .build()
        .unwrap();

    Fixture {
        gateway: Arc::new(gateway),
        limiter,
        cache,
    }
}

/// Gateway mounting the binary's own route table.
pub fn app_fixture(environment: Environment) -> Fixture {
    let config = test_config(environment);
    let cache = Arc::new(MemorySessionCache::new());
    cache.insert(SESSION, [("userId", USER_ID.to_string())]);

    let gate = Arc::new(SessionGate::new(cache.clone(), &config.session));
    let limiter = Arc::new(RateLimiter::new());
    let gateway = Gateway::builder(config, gate.clone())
        .routes(handlers::routes(gate))
        .limiter(limiter.clone())
        .build()
        .unwrap();

    Fixture {
        gateway: Arc::new(gateway),
        limiter,
        cache,
    }
}

/// Gateway whose session cache is down.
pub fn unreachable_cache_gateway(environment: Environment) -> Gateway {
    let config = test_config(environment);
    let gate = Arc::new(SessionGate::new(Arc::new(UnreachableCache), &config.session));
    Gateway::builder(config, gate)
        .routes(test_routes())
        .build()
        .unwrap()
}

pub struct UnreachableCache;

#[async_trait]
impl SessionCache for UnreachableCache {
    async fn get(
        &self,
        _key: &str,
        _fields: &[&str],
    ) -> Result<Option<Vec<Option<String>>>, SessionCacheError> {
        Err(SessionCacheError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, SessionCacheError> {
        Err(SessionCacheError::Unavailable("connection refused".into()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, SessionCacheError> {
        Err(SessionCacheError::Unavailable("connection refused".into()))
    }
}

pub fn request(method: Method, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap()
}

pub fn request_with_session(method: Method, path: &str, session: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("x-forwarded-for", "203.0.113.7")
        .header(header::COOKIE, format!("theme=dark; sessionId={session}"))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Serve `gateway` on an ephemeral port.
pub async fn start_server(gateway: Arc<Gateway>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = HttpServer::new(gateway).run(listener, rx).await;
    });

    (addr, shutdown)
}
