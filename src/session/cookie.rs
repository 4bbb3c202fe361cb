//! Cookie header parsing.
//!
//! Handles `name=value; name2=value2` pairs across one or more `Cookie`
//! headers. Only extraction lives here; what a missing cookie means is
//! decided by the Session Gate.

use axum::http::{header, HeaderMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    #[error("request has no Cookie header")]
    MissingHeader,

    #[error("Cookie header is not valid visible ASCII")]
    InvalidEncoding,

    #[error("malformed cookie pair '{0}'")]
    MalformedPair(String),

    #[error("cookie '{0}' is not present")]
    MissingCookie(String),

    #[error("cookie '{0}' has an empty value")]
    EmptyValue(String),
}

/// Split one `Cookie` header value into `(name, value)` pairs.
///
/// Empty segments (e.g. a trailing `;`) are skipped. A segment without `=`
/// or with an empty name is malformed.
pub fn parse_pairs(value: &str) -> Result<Vec<(&str, &str)>, CookieError> {
    value
        .split(';')
        .filter_map(parse_segment)
        .collect()
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Parse one segment, `None` when it is empty.
fn parse_segment(segment: &str) -> Option<Result<(&str, &str), CookieError>> {
    let segment = segment.trim();
    if segment.is_empty() {
        return None;
    }
    let pair = match segment.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), unquote(value.trim()))),
        _ => Err(CookieError::MalformedPair(segment.to_string())),
    };
    Some(pair)
}

/// Find the value of cookie `name` in the request headers.
///
/// Lenient where `parse_pairs` is strict: malformed segments (valueless
/// flags such as `consent`) and undecodable headers are skipped, and the
/// search continues through every `Cookie` header.
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, CookieError> {
    let mut saw_header = false;
    let mut saw_undecodable = false;

    for raw in headers.get_all(header::COOKIE) {
        saw_header = true;
        let Ok(text) = raw.to_str() else {
            tracing::debug!("Skipping Cookie header that is not visible ASCII");
            saw_undecodable = true;
            continue;
        };

        for segment in text.split(';') {
            match parse_segment(segment) {
                Some(Ok((n, value))) if n == name => {
                    if value.is_empty() {
                        return Err(CookieError::EmptyValue(name.to_string()));
                    }
                    return Ok(value);
                }
                Some(Err(e)) => tracing::debug!(reason = %e, "Skipping cookie segment"),
                _ => {}
            }
        }
    }

    if saw_undecodable {
        return Err(CookieError::InvalidEncoding);
    }

    if saw_header {
        Err(CookieError::MissingCookie(name.to_string()))
    } else {
        Err(CookieError::MissingHeader)
    }
}
