//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, quotas >= 1, sweep interval > 0)
//! - Reject an empty CORS origin (would disable the allow-list)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{GatewayConfig, RateLimitConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Check a single rate-limit quota.
pub fn validate_rate_limit(name: &str, config: &RateLimitConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if config.window_ms == 0 {
        errors.push(ValidationError::new(
            format!("rate_limit.{name}.window_ms"),
            "must be greater than 0",
        ));
    }
    if config.max_requests == 0 {
        errors.push(ValidationError::new(
            format!("rate_limit.{name}.max_requests"),
            "must be at least 1",
        ));
    }
    errors
}

/// Validate the whole configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let limits = &config.rate_limit;
    for (name, quota) in [
        ("general", &limits.general),
        ("auth", &limits.auth),
        ("password_reset", &limits.password_reset),
        ("payment", &limits.payment),
        ("content_creation", &limits.content_creation),
    ] {
        errors.extend(validate_rate_limit(name, quota));
    }

    if limits.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be greater than 0",
        ));
    }

    if config.cors.origin_for(config.environment).trim().is_empty() {
        errors.push(ValidationError::new(
            "cors",
            format!("origin for {} must not be empty", config.environment),
        ));
    }

    if config.session.cookie_name.is_empty() {
        errors.push(ValidationError::new("session.cookie_name", "must not be empty"));
    }

    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new(
            "listener.max_body_size",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
