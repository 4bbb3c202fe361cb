//! Fixed-window rate limiting keyed by identity, method and path.
//!
//! # Algorithm
//! Each key maps to `{count, reset_at_ms}`. On check: a missing or expired
//! window is replaced by `{1, now + window_ms}`, otherwise the count is
//! incremented in place. A count above `max_requests` is rejected with a
//! RateLimit error carrying `ceil((reset_at - now) / 1000)` seconds.
//!
//! # Design Decisions
//! - Fixed window, not a sliding log: up to 2x the quota can pass across a
//!   window boundary
//! - Read-check-increment happens under the DashMap shard lock for the key,
//!   so concurrent requests can never overshoot the quota
//! - State is per process; several replicas each count independently
//! - Expired windows are dropped lazily on access and by a periodic sweeper

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{RateLimitConfig, RateLimitSettings};
use crate::error::AppError;
use crate::observability::metrics;
use crate::session::AuthenticatedIdentity;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Reference sweep cadence.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Logical route group; each carries its own quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitCategory {
    General,
    Auth,
    PasswordReset,
    Payment,
    ContentCreation,
}

impl RateLimitCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RateLimitCategory::General => "general",
            RateLimitCategory::Auth => "auth",
            RateLimitCategory::PasswordReset => "password_reset",
            RateLimitCategory::Payment => "payment",
            RateLimitCategory::ContentCreation => "content_creation",
        }
    }
}

impl RateLimitSettings {
    /// Quota for a route category.
    pub fn quota(&self, category: RateLimitCategory) -> &RateLimitConfig {
        match category {
            RateLimitCategory::General => &self.general,
            RateLimitCategory::Auth => &self.auth,
            RateLimitCategory::PasswordReset => &self.password_reset,
            RateLimitCategory::Payment => &self.payment,
            RateLimitCategory::ContentCreation => &self.content_creation,
        }
    }
}

/// How a route picks its quota category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitPolicy {
    /// Same quota for everyone.
    Fixed(RateLimitCategory),
    /// One quota for signed-in callers, another for anonymous ones.
    Adaptive {
        authenticated: RateLimitCategory,
        anonymous: RateLimitCategory,
    },
}

impl RateLimitPolicy {
    pub fn category_for(self, identity: Option<&AuthenticatedIdentity>) -> RateLimitCategory {
        match self {
            RateLimitPolicy::Fixed(category) => category,
            RateLimitPolicy::Adaptive {
                authenticated,
                anonymous,
            } => {
                if identity.is_some() {
                    authenticated
                } else {
                    anonymous
                }
            }
        }
    }
}

impl From<RateLimitCategory> for RateLimitPolicy {
    fn from(category: RateLimitCategory) -> Self {
        RateLimitPolicy::Fixed(category)
    }
}

/// Who is being counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientIdentity {
    User(i64),
    Ip(String),
}

impl ClientIdentity {
    /// Prefer the authenticated user so counting survives IP changes.
    pub fn resolve(identity: Option<&AuthenticatedIdentity>, headers: &HeaderMap) -> Self {
        match identity {
            Some(identity) => ClientIdentity::User(identity.user_id),
            None => ClientIdentity::Ip(client_ip(headers)),
        }
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdentity::User(id) => write!(f, "user:{}", id),
            ClientIdentity::Ip(ip) => write!(f, "ip:{}", ip),
        }
    }
}

/// Client address from proxy headers: first `x-forwarded-for` entry, then
/// `x-real-ip`, then `cf-connecting-ip`, else `unknown`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header_str("x-forwarded-for") {
        return forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .unwrap_or("unknown")
            .to_string();
    }

    header_str("x-real-ip")
        .or_else(|| header_str("cf-connecting-ip"))
        .unwrap_or("unknown")
        .to_string()
}

/// `identity:method:path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub identity: ClientIdentity,
    pub method: Method,
    pub path: String,
}

impl RateLimitKey {
    pub fn new(identity: ClientIdentity, method: Method, path: impl Into<String>) -> Self {
        Self {
            identity,
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.identity, self.method, self.path)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at_ms: u64,
}

impl RateLimitWindow {
    fn fresh(now_ms: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            reset_at_ms: now_ms.saturating_add(window_ms),
        }
    }

    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_at_ms
    }
}

/// Result of an admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_ms: u64,
}

impl RateLimitDecision {
    /// Write `X-RateLimit-*` headers.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        if let Ok(value) = HeaderValue::from_str(&iso8601(self.reset_at_ms)) {
            headers.insert(X_RATELIMIT_RESET, value);
        }
    }
}

/// A request over quota. Converts into `AppError::RateLimit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Headers to surface alongside the 429 (remaining is always 0).
    pub decision: RateLimitDecision,
    pub retry_after_secs: u64,
    pub message: String,
}

impl From<RateLimitExceeded> for AppError {
    fn from(exceeded: RateLimitExceeded) -> Self {
        AppError::rate_limit(exceeded.message, exceeded.retry_after_secs)
    }
}

/// Snapshot of a live window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub current: u32,
    pub remaining: u32,
    pub reset_at_ms: u64,
}

/// In-memory fixed-window limiter shared by all routes.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<String, RateLimitWindow>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against `key`.
    pub fn check(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
    ) -> Result<RateLimitDecision, RateLimitExceeded> {
        self.check_at(key, config, now_ms())
    }

    /// `check` with an explicit clock.
    pub fn check_at(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
        now_ms: u64,
    ) -> Result<RateLimitDecision, RateLimitExceeded> {
        // The entry guard holds the shard lock for the whole update.
        let window = match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                if window.is_expired(now_ms) {
                    *window = RateLimitWindow::fresh(now_ms, config.window_ms);
                } else {
                    window.count = window.count.saturating_add(1);
                }
                *window
            }
            Entry::Vacant(vacant) => *vacant.insert(RateLimitWindow::fresh(now_ms, config.window_ms)),
        };

        tracing::debug!(
            key = %key,
            current = window.count,
            limit = config.max_requests,
            reset_at_ms = window.reset_at_ms,
            "Rate limit check"
        );

        if window.count > config.max_requests {
            let retry_after = retry_after_secs(window.reset_at_ms, now_ms);
            tracing::warn!(
                key = %key,
                count = window.count,
                limit = config.max_requests,
                retry_after,
                "Rate limit exceeded"
            );
            return Err(RateLimitExceeded {
                decision: RateLimitDecision {
                    limit: config.max_requests,
                    remaining: 0,
                    reset_at_ms: window.reset_at_ms,
                },
                retry_after_secs: retry_after,
                message: config.message.clone(),
            });
        }

        Ok(RateLimitDecision {
            limit: config.max_requests,
            remaining: config.max_requests.saturating_sub(window.count),
            reset_at_ms: window.reset_at_ms,
        })
    }

    /// Current window for `key`, if one is live.
    pub fn status(&self, key: &RateLimitKey, config: &RateLimitConfig) -> Option<RateLimitInfo> {
        let now = now_ms();
        let window = *self.windows.get(&key.to_string())?;
        if window.is_expired(now) {
            return None;
        }
        Some(RateLimitInfo {
            limit: config.max_requests,
            current: window.count,
            remaining: config.max_requests.saturating_sub(window.count),
            reset_at_ms: window.reset_at_ms,
        })
    }

    /// Drop the window for `key`. Returns whether one existed.
    pub fn reset(&self, key: &RateLimitKey) -> bool {
        let removed = self.windows.remove(&key.to_string()).is_some();
        tracing::info!(key = %key, removed, "Rate limit reset");
        removed
    }

    /// Remove every expired window. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(now_ms())
    }

    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_expired(now_ms));
        let after = self.windows.len();
        metrics::record_rate_limit_keys(after);
        before.saturating_sub(after)
    }

    /// Number of tracked keys, expired or not.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Sweep on a fixed cadence until shutdown is signalled.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep();
                        tracing::debug!(removed, remaining = self.len(), "Swept expired rate limit windows");
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

fn retry_after_secs(reset_at_ms: u64, now_ms: u64) -> u64 {
    reset_at_ms.saturating_sub(now_ms).div_ceil(1000)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn iso8601(epoch_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn key(identity: ClientIdentity) -> RateLimitKey {
        RateLimitKey::new(identity, Method::GET, "/get-user-posts")
    }

    #[test]
    fn test_key_format() {
        let k = key(ClientIdentity::User(7));
        assert_eq!(k.to_string(), "user:7:GET:/get-user-posts");
        let k = key(ClientIdentity::Ip("10.0.0.1".into()));
        assert_eq!(k.to_string(), "ip:10.0.0.1:GET:/get-user-posts");
    }

    #[test]
    fn test_client_ip_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");

        headers.insert("cf-connecting-ip", HeaderValue::from_static("3.3.3.3"));
        assert_eq!(client_ip(&headers), "3.3.3.3");

        headers.insert("x-real-ip", HeaderValue::from_static("2.2.2.2"));
        assert_eq!(client_ip(&headers), "2.2.2.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 9.9.9.9"));
        assert_eq!(client_ip(&headers), "1.1.1.1");
    }

    #[test]
    fn test_identity_prefers_user() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("2.2.2.2"));
        let identity = AuthenticatedIdentity { user_id: 5 };
        assert_eq!(
            ClientIdentity::resolve(Some(&identity), &headers),
            ClientIdentity::User(5)
        );
        assert_eq!(
            ClientIdentity::resolve(None, &headers),
            ClientIdentity::Ip("2.2.2.2".into())
        );
    }

    #[test]
    fn test_policy_category() {
        let identity = AuthenticatedIdentity { user_id: 5 };
        let fixed = RateLimitPolicy::from(RateLimitCategory::Payment);
        assert_eq!(fixed.category_for(Some(&identity)), RateLimitCategory::Payment);
        assert_eq!(fixed.category_for(None), RateLimitCategory::Payment);

        let adaptive = RateLimitPolicy::Adaptive {
            authenticated: RateLimitCategory::General,
            anonymous: RateLimitCategory::Auth,
        };
        assert_eq!(adaptive.category_for(Some(&identity)), RateLimitCategory::General);
        assert_eq!(adaptive.category_for(None), RateLimitCategory::Auth);
    }

    #[test]
    fn test_quota_then_reject() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(60_000, 5, "slow down");
        let k = key(ClientIdentity::User(1));
        let now = 1_000_000;

        let remaining: Vec<u32> = (0..5)
            .map(|_| limiter.check_at(&k, &config, now).unwrap().remaining)
            .collect();
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        let exceeded = limiter.check_at(&k, &config, now + 500).unwrap_err();
        assert_eq!(exceeded.decision.remaining, 0);
        assert_eq!(exceeded.retry_after_secs, 60);
        let err = AppError::from(exceeded);
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.retry_after(), Some(60));
        assert_eq!(err.to_string(), "slow down");
    }

    #[test]
    fn test_window_rolls_over() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(1_000, 1, "slow down");
        let k = key(ClientIdentity::Ip("1.1.1.1".into()));

        limiter.check_at(&k, &config, 0).unwrap();
        assert!(limiter.check_at(&k, &config, 999).is_err());

        let decision = limiter.check_at(&k, &config, 1_000).unwrap();
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_at_ms, 2_000);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(60_000, 1, "slow down");
        limiter.check_at(&key(ClientIdentity::User(1)), &config, 0).unwrap();
        limiter.check_at(&key(ClientIdentity::User(2)), &config, 0).unwrap();
        let post = RateLimitKey::new(ClientIdentity::User(1), Method::POST, "/get-user-posts");
        limiter.check_at(&post, &config, 0).unwrap();
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(10_001, 10_000), 1);
        assert_eq!(retry_after_secs(70_000, 10_000), 60);
        assert_eq!(retry_after_secs(10_000, 10_000), 0);
    }

    #[test]
    fn test_sweep_removes_expired_only() {
        let limiter = RateLimiter::new();
        let short = RateLimitConfig::new(100, 10, "x");
        let long = RateLimitConfig::new(10_000, 10, "x");
        limiter.check_at(&key(ClientIdentity::User(1)), &short, 0).unwrap();
        limiter.check_at(&key(ClientIdentity::User(2)), &long, 0).unwrap();

        assert_eq!(limiter.sweep_at(500), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_status_and_reset() {
        let limiter = RateLimiter::new();
        let config = RateLimitConfig::new(60_000, 3, "x");
        let k = key(ClientIdentity::User(9));
        assert!(limiter.status(&k, &config).is_none());

        limiter.check(&k, &config).unwrap();
        limiter.check(&k, &config).unwrap();
        let info = limiter.status(&k, &config).unwrap();
        assert_eq!(info.current, 2);
        assert_eq!(info.remaining, 1);

        assert!(limiter.reset(&k));
        assert!(limiter.status(&k, &config).is_none());
        assert!(!limiter.reset(&k));
    }

    #[test]
    fn test_decision_headers() {
        let decision = RateLimitDecision {
            limit: 5,
            remaining: 4,
            reset_at_ms: 0,
        };
        let mut headers = HeaderMap::new();
        decision.apply(&mut headers);
        assert_eq!(headers[X_RATELIMIT_LIMIT], "5");
        assert_eq!(headers[X_RATELIMIT_REMAINING], "4");
        assert_eq!(headers[X_RATELIMIT_RESET], "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_concurrent_checks_never_overshoot() {
        let limiter = Arc::new(RateLimiter::new());
        let config = Arc::new(RateLimitConfig::new(60_000, 10, "x"));
        let k = Arc::new(key(ClientIdentity::User(1)));

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let (limiter, config, k) = (limiter.clone(), config.clone(), k.clone());
                std::thread::spawn(move || limiter.check(&k, &config).is_ok())
            })
            .collect();
        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(allowed, 10);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let limiter = Arc::new(RateLimiter::new());
        let (tx, rx) = broadcast::channel(1);
        let handle = limiter.clone().spawn_sweeper(Duration::from_millis(10), rx);
        limiter
            .check_at(&key(ClientIdentity::User(1)), &RateLimitConfig::new(1, 1, "x"), 0)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(limiter.is_empty());

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
