//! CORS allow-list.
//!
//! One configured origin per environment is reflected on every response.
//! The request's `Origin` header is never echoed back.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use thiserror::Error;

use crate::config::{CorsConfig, Environment};

#[derive(Debug, Error)]
#[error("invalid CORS {field}: '{value}'")]
pub struct InvalidCorsConfig {
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    allow_credentials: bool,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig, environment: Environment) -> Result<Self, InvalidCorsConfig> {
        let value = |field: &'static str, raw: String| {
            HeaderValue::from_str(&raw).map_err(|_| InvalidCorsConfig { field, value: raw })
        };

        Ok(Self {
            allow_origin: value("origin", config.origin_for(environment).to_string())?,
            allow_methods: value("methods", config.allowed_methods.join(", "))?,
            allow_headers: value("headers", config.allowed_headers.join(", "))?,
            allow_credentials: config.allow_credentials,
        })
    }

    pub fn apply_to(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }

    /// Empty 200 answer to a preflight request.
    pub fn preflight(&self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::OK;
        self.apply_to(response.headers_mut());
        response
    }
}
