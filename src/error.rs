//! Error taxonomy and the single point of translation to wire format.
//!
//! # Data Flow
//! ```text
//! stage / handler failure
//!     → AppError (tagged by kind, carries kind-specific payload)
//!     → ErrorResponder::respond (log, suppress detail in production)
//!     → JSON body { message, details?, error? } + status (+ Retry-After)
//! ```
//!
//! # Design Decisions
//! - Components never build error responses themselves; they return `AppError`
//! - Operational errors surface their message verbatim
//! - Unexpected errors are replaced by a generic message in production

use std::backtrace::Backtrace;
use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::Environment;

/// Boxed error accepted by [`AppError::unexpected`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Message shown to clients in place of unexpected errors in production.
pub const GENERIC_MESSAGE: &str = "Internal Server Error";

/// Discriminant of [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    RateLimit,
    Database,
    ExternalService,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code, stable across releases.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Authentication => "AUTHENTICATION_ERROR",
            ErrorKind::Authorization => "AUTHORIZATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND_ERROR",
            ErrorKind::Conflict => "CONFLICT_ERROR",
            ErrorKind::RateLimit => "RATE_LIMIT_ERROR",
            ErrorKind::Database => "DATABASE_ERROR",
            ErrorKind::ExternalService => "EXTERNAL_SERVICE_ERROR",
            ErrorKind::Internal => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Application-wide error type.
///
/// Every variant except `Internal` is operational: an anticipated failure
/// whose message is safe to show to the client.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        /// Field name → problem with that field.
        details: BTreeMap<String, String>,
    },

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    RateLimit { message: String, retry_after_secs: u64 },

    #[error("{0}")]
    Database(String),

    #[error("{message}")]
    ExternalService { service: String, message: String },

    /// Unexpected failure. Never operational.
    #[error("{message}")]
    Internal {
        message: String,
        stack: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl AppError {
    pub fn validation<I, K, V>(message: impl Into<String>, details: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        AppError::Validation {
            message: message.into(),
            details: details
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        AppError::Authentication(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        AppError::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn rate_limit(message: impl Into<String>, retry_after_secs: u64) -> Self {
        AppError::RateLimit {
            message: message.into(),
            retry_after_secs,
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        AppError::Database(message.into())
    }

    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Wrap an unexpected error, capturing the current stack.
    pub fn unexpected(err: impl Into<BoxError>) -> Self {
        let source = err.into();
        AppError::Internal {
            message: source.to_string(),
            stack: Backtrace::force_capture().to_string(),
            source: Some(source),
        }
    }

    /// Unexpected failure described only by a message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::internal_with_stack(message, Backtrace::force_capture().to_string())
    }

    /// Unexpected failure whose stack was captured elsewhere (e.g. a panic hook).
    pub fn internal_with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
            stack: stack.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::Authentication(_) => ErrorKind::Authentication,
            AppError::Authorization(_) => ErrorKind::Authorization,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::RateLimit { .. } => ErrorKind::RateLimit,
            AppError::Database(_) => ErrorKind::Database,
            AppError::ExternalService { .. } => ErrorKind::ExternalService,
            AppError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Internal { .. })
    }

    /// Database and upstream failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::ExternalService { .. }
        )
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::RateLimit {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::unexpected(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::unexpected(err)
    }
}

/// Convenience alias for handler and stage results.
pub type AppResult<T> = Result<T, AppError>;

/// Wire shape of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    /// Raw error message, only outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Renders `AppError`s into HTTP responses.
///
/// The environment is fixed at construction; rendering is deterministic
/// given the error and that flag.
#[derive(Debug, Clone, Copy)]
pub struct ErrorResponder {
    environment: Environment,
}

impl ErrorResponder {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Log the error and turn it into a response.
    pub fn respond(&self, error: AppError, method: &Method, path: &str) -> Response {
        self.log(&error, method, path);

        let status = error.status();
        let retry_after = error.retry_after();
        let body = self.render(&error);

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }

    /// Build the client-facing body without logging.
    pub fn render(&self, error: &AppError) -> ErrorBody {
        let production = self.environment.is_production();
        let mut details = Map::new();

        let message = match error {
            AppError::Validation {
                message,
                details: fields,
            } => {
                for (field, problem) in fields {
                    details.insert(field.clone(), Value::String(problem.clone()));
                }
                message.clone()
            }
            AppError::RateLimit {
                message,
                retry_after_secs,
            } => {
                details.insert("retryAfter".to_string(), Value::from(*retry_after_secs));
                message.clone()
            }
            AppError::Internal { message, stack, .. } => {
                if production {
                    GENERIC_MESSAGE.to_string()
                } else {
                    details.insert("stack".to_string(), Value::String(stack.clone()));
                    message.clone()
                }
            }
            AppError::Authentication(message)
            | AppError::Authorization(message)
            | AppError::NotFound(message)
            | AppError::Conflict(message)
            | AppError::Database(message)
            | AppError::ExternalService { message, .. } => message.clone(),
        };

        ErrorBody {
            message,
            details: (!details.is_empty()).then_some(details),
            error: (!production).then(|| error.to_string()),
        }
    }

    fn log(&self, error: &AppError, method: &Method, path: &str) {
        match error {
            AppError::Internal { message, stack, .. } => {
                tracing::error!(
                    code = error.code(),
                    method = %method,
                    path = %path,
                    error = %message,
                    stack = %stack,
                    "Unexpected error"
                );
            }
            AppError::ExternalService { service, message } => {
                tracing::warn!(
                    code = error.code(),
                    status = error.status().as_u16(),
                    service = %service,
                    method = %method,
                    path = %path,
                    "Application error: {}",
                    message
                );
            }
            _ => {
                tracing::warn!(
                    code = error.code(),
                    status = error.status().as_u16(),
                    method = %method,
                    path = %path,
                    "Application error: {}",
                    error
                );
            }
        }
    }
}
