//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::security::rate_limit::DEFAULT_SWEEP_INTERVAL;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Runtime environment; drives error detail, security headers and CORS origin.
    pub environment: Environment,

    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Session cookie and sign-in redirect settings.
    pub session: SessionConfig,

    /// CORS allow-list.
    pub cors: CorsConfig,

    /// Per-category rate limiting.
    pub rate_limit: RateLimitSettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Runtime environment, selected once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an environment name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment '{0}' (expected development, production or test)")]
pub struct UnknownEnvironment(pub String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(UnknownEnvironment(other.to_string())),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Session cookie settings.
///
/// Only the cookie is configured here. The session store itself is a
/// `SessionCache` handed to `SessionGate::new`; the bundled binary uses an
/// empty in-memory cache, so it cannot authenticate anyone on its own.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session key.
    pub cookie_name: String,

    /// Where browsers without a session cookie are sent.
    pub sign_in_path: String,

    /// Field of the cached session holding the user id.
    pub user_id_field: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sessionId".to_string(),
            sign_in_path: "./Signin".to_string(),
            user_id_field: "userId".to_string(),
        }
    }
}

/// CORS allow-list. Exactly one origin is reflected per environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub production_origin: String,
    pub development_origin: String,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl CorsConfig {
    /// The single origin allowed in `environment`.
    pub fn origin_for(&self, environment: Environment) -> &str {
        if environment.is_production() {
            &self.production_origin
        } else {
            &self.development_origin
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            production_origin: "https://your-production-domain.com".to_string(),
            development_origin: "http://localhost:3000".to_string(),
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: ["Content-Type", "Authorization", "X-Requested-With"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_credentials: true,
        }
    }
}

/// Quota for one route category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds (> 0).
    pub window_ms: u64,

    /// Requests allowed per window (>= 1).
    pub max_requests: u32,

    /// Message returned when the quota is exceeded.
    pub message: String,
}

impl RateLimitConfig {
    pub fn new(window_ms: u64, max_requests: u32, message: impl Into<String>) -> Self {
        Self {
            window_ms,
            max_requests,
            message: message.into(),
        }
    }

    pub fn general() -> Self {
        Self::new(
            15 * 60 * 1000,
            100,
            "Too many requests from this IP, please try again later.",
        )
    }

    pub fn auth() -> Self {
        Self::new(
            15 * 60 * 1000,
            5,
            "Too many authentication attempts, please try again later.",
        )
    }

    pub fn password_reset() -> Self {
        Self::new(
            60 * 60 * 1000,
            3,
            "Too many password reset attempts, please try again later.",
        )
    }

    pub fn payment() -> Self {
        Self::new(
            15 * 60 * 1000,
            10,
            "Too many payment attempts, please try again later.",
        )
    }

    pub fn content_creation() -> Self {
        Self::new(
            60 * 1000,
            5,
            "Too many content creation attempts, please try again later.",
        )
    }
}

/// Rate limiting configuration, one quota per route category.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Disable to skip the rate limit stage entirely.
    pub enabled: bool,

    /// How often expired windows are swept, in seconds.
    pub sweep_interval_secs: u64,

    pub general: RateLimitConfig,
    pub auth: RateLimitConfig,
    pub password_reset: RateLimitConfig,
    pub payment: RateLimitConfig,
    pub content_creation: RateLimitConfig,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL.as_secs(),
            general: RateLimitConfig::general(),
            auth: RateLimitConfig::auth(),
            password_reset: RateLimitConfig::password_reset(),
            payment: RateLimitConfig::payment(),
            content_creation: RateLimitConfig::content_creation(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Force JSON logs; defaults to JSON in production only.
    pub json_logs: Option<bool>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
