//! Suspicious request detection.
//!
//! Observes only: a match is logged as a security event and the request
//! continues through the pipeline unchanged.

use axum::http::{HeaderMap, Method, Uri};

use crate::security::rate_limit::client_ip;

const SCANNER_AGENTS: &[&str] = &["sqlmap", "nmap", "nikto", "dirb", "gobuster"];
const URL_ATTACKS: &[&str] = &["<script", "javascript:", "union select", "drop table"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suspicion {
    ScannerUserAgent(String),
    AttackPattern(String),
}

/// Inspect a request and log every finding.
pub fn inspect(method: &Method, uri: &Uri, headers: &HeaderMap) -> Vec<Suspicion> {
    let mut findings = Vec::new();

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let agent_lower = user_agent.to_ascii_lowercase();
    if SCANNER_AGENTS.iter().any(|s| agent_lower.contains(s)) {
        tracing::warn!(
            user_agent = %user_agent,
            ip = %client_ip(headers),
            method = %method,
            url = %uri,
            "Suspicious user agent detected"
        );
        findings.push(Suspicion::ScannerUserAgent(user_agent.to_string()));
    }

    let url = uri.to_string();
    let url_lower = url.to_ascii_lowercase();
    let pattern = URL_ATTACKS
        .iter()
        .find(|p| contains_spaced(&url_lower, p))
        .map(|p| p.to_string())
        .or_else(|| has_event_handler(&url_lower).then(|| "on*=".to_string()));
    if let Some(pattern) = pattern {
        tracing::warn!(
            url = %url,
            pattern = %pattern,
            ip = %client_ip(headers),
            method = %method,
            "Potential attack detected in URL"
        );
        findings.push(Suspicion::AttackPattern(pattern));
    }

    findings
}

/// Match `pattern`, letting each space in it stand for any run of
/// whitespace or URL-encoded separators (`+`, `%20`).
fn contains_spaced(haystack: &str, pattern: &str) -> bool {
    let normalized = haystack.replace("%20", " ").replace('+', " ");
    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.contains(pattern)
}

/// `on<word>=` with optional whitespace before `=`, e.g. `onerror=`.
fn has_event_handler(haystack: &str) -> bool {
    let bytes = haystack.as_bytes();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find("on") {
        let mut i = start + pos + 2;
        let word_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
            i += 1;
        }
        let had_word = i > word_start;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if had_word && i < bytes.len() && bytes[i] == b'=' {
            return true;
        }
        start += pos + 1;
    }
    false
}
