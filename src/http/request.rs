//! Request identification.
//!
//! The outermost layer stamps every request with an `x-request-id` (kept if
//! the client sent one); the gateway reads it into the request span and echoes
//! it on the response.

use axum::http::HeaderName;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
