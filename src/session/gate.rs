//! Session Gate: resolves a request's session cookie to a user identity.
//!
//! # Outcomes
//! - No usable session cookie → `GateOutcome::SignInRequired` (caller redirects)
//! - Cookie present but cache unreachable, session unknown, or no user id
//!   → `AppError::Authentication` (401 JSON through the Error Responder)
//! - Otherwise → `GateOutcome::Authenticated`

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::config::SessionConfig;
use crate::error::AppError;
use crate::observability::metrics;
use crate::session::cache::SessionCache;
use crate::session::cookie::find_cookie;

/// Identity attached to a request once the Session Gate accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthenticatedIdentity {
    pub user_id: i64,
}

/// Non-error result of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Authenticated(AuthenticatedIdentity),
    SignInRequired,
}

/// Read-only client of the session cache.
#[derive(Clone)]
pub struct SessionGate {
    cache: Arc<dyn SessionCache>,
    cookie_name: String,
    user_id_field: String,
    sign_in_location: HeaderValue,
}

impl SessionGate {
    pub fn new(cache: Arc<dyn SessionCache>, config: &SessionConfig) -> Self {
        let sign_in_location = HeaderValue::from_str(&config.sign_in_path).unwrap_or_else(|_| {
            tracing::warn!(
                sign_in_path = %config.sign_in_path,
                "Invalid sign-in path, falling back to ./Signin"
            );
            HeaderValue::from_static("./Signin")
        });

        Self {
            cache,
            cookie_name: config.cookie_name.clone(),
            user_id_field: config.user_id_field.clone(),
            sign_in_location,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Resolve the request's identity.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<GateOutcome, AppError> {
        let key = match find_cookie(headers, &self.cookie_name) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(reason = %e, "No session cookie, redirecting to sign-in");
                metrics::record_auth_failure("missing_cookie");
                return Ok(GateOutcome::SignInRequired);
            }
        };

        let values = match self.cache.get(key, &[self.user_id_field.as_str()]).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(error = %e, "Session cache lookup failed");
                metrics::record_auth_failure("cache_error");
                return Err(AppError::authentication("Authentication failed"));
            }
        };

        let raw = values
            .and_then(|fields| fields.into_iter().next().flatten())
            .ok_or_else(|| {
                tracing::info!("Session not found or has no user id");
                metrics::record_auth_failure("unknown_session");
                AppError::authentication("Authentication failed")
            })?;

        let user_id = raw.trim().parse::<i64>().map_err(|_| {
            tracing::warn!(value = %raw, "Session user id is not an integer");
            metrics::record_auth_failure("invalid_user_id");
            AppError::authentication("Authentication failed")
        })?;

        Ok(GateOutcome::Authenticated(AuthenticatedIdentity { user_id }))
    }

    /// Redirect sent when the request carries no session cookie.
    pub fn sign_in_redirect(&self) -> Response {
        (
            StatusCode::FOUND,
            [(header::LOCATION, self.sign_in_location.clone())],
        )
            .into_response()
    }

    /// Delete the request's session from the cache.
    ///
    /// Returns `false` when there is no cookie or the session is already gone.
    pub async fn revoke(&self, headers: &HeaderMap) -> Result<bool, AppError> {
        let Ok(key) = find_cookie(headers, &self.cookie_name) else {
            return Ok(false);
        };

        let exists = self
            .cache
            .exists(key)
            .await
            .map_err(|e| AppError::external_service("session-cache", e.to_string()))?;
        if !exists {
            return Ok(false);
        }

        self.cache
            .delete(key)
            .await
            .map_err(|e| AppError::external_service("session-cache", e.to_string()))
    }
}
