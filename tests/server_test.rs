//! The gateway behind a real listener, exercised over HTTP.

use std::time::Duration;

use axum::http::StatusCode;
use reqwest::redirect::Policy;

use feed_gateway::config::Environment;

mod common;

use common::{app_fixture, start_server, SESSION, USER_ID};

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_health_over_http() {
    let fx = app_fixture(Environment::Production);
    let (addr, shutdown) = start_server(fx.gateway.clone()).await;

    let response = client()
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), StatusCode::OK.as_u16());
    let headers = response.headers();
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("strict-transport-security"));
    assert!(!headers.contains_key("x-ratelimit-limit"));
    assert!(headers.contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    shutdown.trigger();
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let fx = app_fixture(Environment::Test);
    let (addr, shutdown) = start_server(fx.gateway.clone()).await;

    let response = client()
        .get(format!("http://{addr}/health"))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-me-123");
    shutdown.trigger();
}

#[tokio::test]
async fn test_session_lifecycle_over_http() {
    let fx = app_fixture(Environment::Test);
    let (addr, shutdown) = start_server(fx.gateway.clone()).await;
    let client = client();
    let cookie = format!("sessionId={SESSION}");

    // No cookie: browser is sent to sign in.
    let response = client
        .get(format!("http://{addr}/get-user-info"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 302);
    assert_eq!(response.headers()["location"], "./Signin");

    // Valid cookie: identity comes back.
    let response = client
        .get(format!("http://{addr}/get-user-info"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "99");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["userId"], USER_ID);

    // Sign out clears the cookie and the cached session.
    let response = client
        .post(format!("http://{addr}/Signout"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["set-cookie"],
        "sessionId=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
    );
    assert!(fx.cache.is_empty());

    // The stale cookie no longer authenticates.
    let response = client
        .get(format!("http://{addr}/get-user-info"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Authentication failed");

    // Signing out twice finds nothing to revoke.
    let response = client
        .post(format!("http://{addr}/Signout"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    shutdown.trigger();
}

#[tokio::test]
async fn test_preflight_over_http() {
    let fx = app_fixture(Environment::Production);
    let (addr, shutdown) = start_server(fx.gateway.clone()).await;

    let response = client()
        .request(reqwest::Method::OPTIONS, format!("http://{addr}/get-user-info"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://your-production-domain.com"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    assert!(response.bytes().await.unwrap().is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let fx = app_fixture(Environment::Test);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let shutdown = feed_gateway::Shutdown::new();
    let server = feed_gateway::HttpServer::new(fx.gateway.clone());
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
