//! Session-bound handlers: who am I, and sign out.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::pipeline::RequestContext;
use crate::session::SessionGate;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentUser {
    user_id: i64,
}

/// Identity resolved by the Session Gate. Only mounted on protected routes.
pub async fn current_user(ctx: RequestContext) -> AppResult<Response> {
    let user_id = ctx
        .user_id()
        .ok_or_else(|| AppError::internal("current_user mounted on a public route"))?;
    Ok(Json(CurrentUser { user_id }).into_response())
}

/// Expire the session cookie in the browser.
pub fn clear_cookie(cookie_name: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{cookie_name}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
    ))
    .map_err(AppError::unexpected)
}

/// Delete the caller's session and clear its cookie.
pub async fn sign_out(gate: Arc<SessionGate>, ctx: RequestContext) -> AppResult<Response> {
    if !gate.revoke(&ctx.headers).await? {
        return Err(AppError::not_found("Session doesn't exist"));
    }

    tracing::info!(request_id = %ctx.request_id, "Session revoked");
    let cookie = clear_cookie(gate.cookie_name())?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "Come back any time" })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::{AuthenticatedIdentity, MemorySessionCache};
    use axum::http::{HeaderMap, Method, StatusCode, Uri};

    fn ctx_with_cookie(cookie: Option<&str>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        RequestContext::new("req-1", Method::POST, Uri::from_static("/Signout"), headers)
    }

    #[tokio::test]
    async fn test_current_user_reads_identity() {
        let mut ctx = ctx_with_cookie(None);
        ctx.identity = Some(AuthenticatedIdentity { user_id: 42 });

        let response = current_user(ctx).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["userId"], 42);
    }

    #[tokio::test]
    async fn test_sign_out_revokes_and_clears_cookie() {
        let cache = Arc::new(MemorySessionCache::new());
        cache.insert("abc", [("userId", "7")]);
        let gate = Arc::new(SessionGate::new(cache.clone(), &SessionConfig::default()));

        let response = sign_out(gate, ctx_with_cookie(Some("sessionId=abc"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::SET_COOKIE],
            "sessionId=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
        );
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_sign_out_unknown_session() {
        let cache = Arc::new(MemorySessionCache::new());
        let gate = Arc::new(SessionGate::new(cache, &SessionConfig::default()));

        let err = sign_out(gate, ctx_with_cookie(Some("sessionId=gone")))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
