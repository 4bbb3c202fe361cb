//! Security response headers.
//!
//! # Responsibilities
//! - Build Content-Security-Policy, Strict-Transport-Security and
//!   X-Frame-Options from an environment-selected profile
//! - Add the always-on hardening headers on top of the profile
//! - Strip headers that leak the implementation (X-Powered-By, Server)
//!
//! # Design Decisions
//! - Profiles are compiled into a header list once per process; applying
//!   them is infallible and never touches the body
//! - Directives with no sources are omitted, never emitted empty

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};

use crate::config::Environment;

/// Payment processor script/frame origin.
const PAYMENT_JS: &str = "https://js.stripe.com";
/// Payment processor API origin.
const PAYMENT_API: &str = "https://api.stripe.com";

const PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=()";

/// X-Frame-Options action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAction {
    Deny,
    SameOrigin,
    /// `ALLOW-FROM <domain>`; without a domain this degrades to SAMEORIGIN.
    AllowFrom(Option<String>),
}

impl FrameAction {
    pub fn header_value(&self) -> String {
        match self {
            FrameAction::Deny => "DENY".to_string(),
            FrameAction::SameOrigin => "SAMEORIGIN".to_string(),
            FrameAction::AllowFrom(Some(domain)) if !domain.trim().is_empty() => {
                format!("ALLOW-FROM {}", domain.trim())
            }
            FrameAction::AllowFrom(_) => "SAMEORIGIN".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HstsPolicy {
    pub max_age_secs: u64,
    pub include_subdomains: bool,
    pub preload: bool,
}

impl HstsPolicy {
    pub fn header_value(&self) -> String {
        let mut parts = vec![format!("max-age={}", self.max_age_secs)];
        if self.include_subdomains {
            parts.push("includeSubDomains".to_string());
        }
        if self.preload {
            parts.push("preload".to_string());
        }
        parts.join("; ")
    }
}

/// A security header profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeaderConfig {
    /// CSP directives in emission order.
    pub csp_directives: Vec<(String, Vec<String>)>,
    /// Emit the valueless `upgrade-insecure-requests` directive.
    pub upgrade_insecure_requests: bool,
    pub cross_origin_embedder_policy: bool,
    pub cross_origin_opener_policy: bool,
    pub cross_origin_resource_policy: bool,
    pub dns_prefetch_control: bool,
    pub frame_options: Option<FrameAction>,
    pub hsts: Option<HstsPolicy>,
    pub ie_no_open: bool,
    pub origin_agent_cluster: bool,
    pub referrer_policy: String,
}

fn directive(name: &str, sources: &[&str]) -> (String, Vec<String>) {
    (
        name.to_string(),
        sources.iter().map(|s| s.to_string()).collect(),
    )
}

impl SecurityHeaderConfig {
    /// Profile for environments that are neither production nor development.
    pub fn baseline() -> Self {
        Self {
            csp_directives: vec![
                directive("default-src", &["'self'"]),
                directive("script-src", &["'self'", "'unsafe-inline'", PAYMENT_JS]),
                directive("style-src", &["'self'", "'unsafe-inline'", "https://fonts.googleapis.com"]),
                directive("font-src", &["'self'", "https://fonts.gstatic.com"]),
                directive("img-src", &["'self'", "data:", "https:"]),
                directive("connect-src", &["'self'", PAYMENT_API]),
                directive("frame-src", &["'self'", PAYMENT_JS]),
                directive("object-src", &["'none'"]),
                directive("media-src", &["'self'"]),
                directive("manifest-src", &["'self'"]),
                directive("worker-src", &["'self'"]),
                directive("child-src", &["'self'"]),
                directive("form-action", &["'self'"]),
                directive("frame-ancestors", &["'none'"]),
                directive("base-uri", &["'self'"]),
            ],
            upgrade_insecure_requests: true,
            // Off: breaks the embedded payment frame.
            cross_origin_embedder_policy: false,
            cross_origin_opener_policy: true,
            cross_origin_resource_policy: true,
            dns_prefetch_control: true,
            frame_options: Some(FrameAction::Deny),
            hsts: Some(HstsPolicy {
                max_age_secs: 31_536_000,
                include_subdomains: true,
                preload: true,
            }),
            ie_no_open: true,
            origin_agent_cluster: true,
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
        }
    }

    /// Strict profile: scripts and styles pinned to self plus the payment processor.
    pub fn production() -> Self {
        Self {
            csp_directives: vec![
                directive("default-src", &["'self'"]),
                directive("script-src", &["'self'", PAYMENT_JS]),
                directive("style-src", &["'self'", "https://fonts.googleapis.com"]),
                directive("font-src", &["'self'", "https://fonts.gstatic.com"]),
                directive("img-src", &["'self'", "data:", "https:"]),
                directive("connect-src", &["'self'", PAYMENT_API]),
                directive("frame-src", &["'self'", PAYMENT_JS]),
                directive("object-src", &["'none'"]),
                directive("media-src", &["'self'"]),
                directive("manifest-src", &["'self'"]),
                directive("worker-src", &["'self'"]),
                directive("child-src", &["'self'"]),
                directive("form-action", &["'self'"]),
                directive("frame-ancestors", &["'none'"]),
                directive("base-uri", &["'self'"]),
            ],
            ..Self::baseline()
        }
    }

    /// Relaxed profile for hot-reload tooling: inline/eval scripts, websockets.
    pub fn development() -> Self {
        Self {
            csp_directives: vec![
                directive("default-src", &["'self'"]),
                directive("script-src", &["'self'", "'unsafe-inline'", "'unsafe-eval'", PAYMENT_JS]),
                directive("style-src", &["'self'", "'unsafe-inline'", "https://fonts.googleapis.com"]),
                directive("font-src", &["'self'", "https://fonts.gstatic.com"]),
                directive("img-src", &["'self'", "data:", "https:"]),
                directive("connect-src", &["'self'", PAYMENT_API, "ws:", "wss:"]),
                directive("frame-src", &["'self'", PAYMENT_JS]),
                directive("object-src", &["'none'"]),
                directive("media-src", &["'self'"]),
                directive("manifest-src", &["'self'"]),
                directive("worker-src", &["'self'", "blob:"]),
                directive("child-src", &["'self'"]),
                directive("form-action", &["'self'"]),
                directive("frame-ancestors", &["'none'"]),
                directive("base-uri", &["'self'"]),
            ],
            upgrade_insecure_requests: false,
            hsts: Some(HstsPolicy {
                max_age_secs: 3_600,
                include_subdomains: false,
                preload: false,
            }),
            ..Self::baseline()
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
            Environment::Test => Self::baseline(),
        }
    }

    /// Serialized CSP, or `None` when no directive has sources.
    pub fn content_security_policy(&self) -> Option<String> {
        let mut parts: Vec<String> = self
            .csp_directives
            .iter()
            .filter(|(_, sources)| !sources.is_empty())
            .map(|(name, sources)| format!("{} {}", name, sources.join(" ")))
            .collect();
        if self.upgrade_insecure_requests {
            parts.push("upgrade-insecure-requests".to_string());
        }
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

/// Compiled header set, ready to stamp onto responses.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    set: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn compile(config: &SecurityHeaderConfig) -> Self {
        let mut set: Vec<(HeaderName, String)> = Vec::new();

        if let Some(csp) = config.content_security_policy() {
            set.push((header::CONTENT_SECURITY_POLICY, csp));
        }
        if config.cross_origin_embedder_policy {
            set.push((HeaderName::from_static("cross-origin-embedder-policy"), "require-corp".into()));
        }
        if config.cross_origin_opener_policy {
            set.push((HeaderName::from_static("cross-origin-opener-policy"), "same-origin".into()));
        }
        if config.cross_origin_resource_policy {
            set.push((HeaderName::from_static("cross-origin-resource-policy"), "same-origin".into()));
        }
        if config.dns_prefetch_control {
            set.push((header::X_DNS_PREFETCH_CONTROL, "off".into()));
        }
        if let Some(action) = &config.frame_options {
            set.push((header::X_FRAME_OPTIONS, action.header_value()));
        }
        if let Some(hsts) = &config.hsts {
            set.push((header::STRICT_TRANSPORT_SECURITY, hsts.header_value()));
        }
        if config.ie_no_open {
            set.push((HeaderName::from_static("x-download-options"), "noopen".into()));
        }
        if config.origin_agent_cluster {
            set.push((HeaderName::from_static("origin-agent-cluster"), "?1".into()));
        }

        // Always on, whatever the profile says.
        let referrer = if config.referrer_policy.trim().is_empty() {
            "strict-origin-when-cross-origin".to_string()
        } else {
            config.referrer_policy.clone()
        };
        set.push((header::REFERRER_POLICY, referrer));
        set.push((header::X_CONTENT_TYPE_OPTIONS, "nosniff".into()));
        set.push((header::X_XSS_PROTECTION, "1; mode=block".into()));
        set.push((HeaderName::from_static("permissions-policy"), PERMISSIONS_POLICY.into()));
        set.push((HeaderName::from_static("x-permitted-cross-domain-policies"), "none".into()));

        let set = set
            .into_iter()
            .filter_map(|(name, value)| match HeaderValue::from_str(&value) {
                Ok(value) => Some((name, value)),
                Err(_) => {
                    tracing::warn!(header = %name, value = %value, "Skipping invalid security header value");
                    None
                }
            })
            .collect();

        Self { set }
    }

    /// Compile the profile for `environment`.
    pub fn for_environment(environment: Environment) -> Self {
        Self::compile(&SecurityHeaderConfig::for_environment(environment))
    }

    pub fn apply_to(&self, headers: &mut HeaderMap) {
        headers.remove("x-powered-by");
        headers.remove(header::SERVER);
        for (name, value) in &self.set {
            headers.insert(name.clone(), value.clone());
        }
    }

    /// Stamp the headers onto a response, leaving status and body intact.
    pub fn apply(&self, mut response: Response) -> Response {
        self.apply_to(response.headers_mut());
        response
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;

    #[test]
    fn test_frame_options() {
        assert_eq!(FrameAction::Deny.header_value(), "DENY");
        assert_eq!(FrameAction::SameOrigin.header_value(), "SAMEORIGIN");
        assert_eq!(
            FrameAction::AllowFrom(Some("https://partner.example".into())).header_value(),
            "ALLOW-FROM https://partner.example"
        );
        assert_eq!(FrameAction::AllowFrom(None).header_value(), "SAMEORIGIN");
        assert_eq!(FrameAction::AllowFrom(Some("  ".into())).header_value(), "SAMEORIGIN");
    }

    #[test]
    fn test_hsts_value() {
        let hsts = HstsPolicy {
            max_age_secs: 31_536_000,
            include_subdomains: true,
            preload: true,
        };
        assert_eq!(hsts.header_value(), "max-age=31536000; includeSubDomains; preload");

        let dev = SecurityHeaderConfig::development().hsts.unwrap();
        assert_eq!(dev.header_value(), "max-age=3600");
    }

    #[test]
    fn test_csp_omits_empty_directives() {
        let config = SecurityHeaderConfig {
            csp_directives: vec![
                ("default-src".into(), vec!["'self'".into()]),
                ("script-src".into(), vec![]),
            ],
            upgrade_insecure_requests: false,
            ..SecurityHeaderConfig::baseline()
        };
        assert_eq!(config.content_security_policy().unwrap(), "default-src 'self'");

        let empty = SecurityHeaderConfig {
            csp_directives: vec![("script-src".into(), vec![])],
            upgrade_insecure_requests: false,
            ..SecurityHeaderConfig::baseline()
        };
        assert!(empty.content_security_policy().is_none());
    }

    #[test]
    fn test_production_csp_is_strict() {
        let csp = SecurityHeaderConfig::production().content_security_policy().unwrap();
        assert!(csp.contains("script-src 'self' https://js.stripe.com;"));
        assert!(!csp.contains("unsafe-inline"));
        assert!(!csp.contains("unsafe-eval"));
        assert!(csp.ends_with("upgrade-insecure-requests"));
    }

    #[test]
    fn test_development_csp_is_relaxed() {
        let csp = SecurityHeaderConfig::development().content_security_policy().unwrap();
        assert!(csp.contains("'unsafe-eval'"));
        assert!(csp.contains("ws: wss:"));
        assert!(!csp.contains("upgrade-insecure-requests"));
    }

    #[test]
    fn test_apply_keeps_status_and_strips_identity() {
        let headers = SecurityHeaders::for_environment(Environment::Production);
        let response = Response::builder()
            .status(StatusCode::IM_A_TEAPOT)
            .header("x-powered-by", "Bun")
            .header(header::SERVER, "bun")
            .body(Body::from("tea"))
            .unwrap();

        let response = headers.apply(response);
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let h = response.headers();
        assert!(h.get("x-powered-by").is_none());
        assert!(h.get(header::SERVER).is_none());
        assert_eq!(h[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(h[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(h[header::X_XSS_PROTECTION], "1; mode=block");
        assert_eq!(h[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
        assert_eq!(h["permissions-policy"], PERMISSIONS_POLICY);
        assert!(h.contains_key(header::CONTENT_SECURITY_POLICY));
        assert!(h.contains_key(header::STRICT_TRANSPORT_SECURITY));
        assert!(!h.contains_key("cross-origin-embedder-policy"));
    }

    #[test]
    fn test_always_on_headers_survive_minimal_profile() {
        let config = SecurityHeaderConfig {
            csp_directives: vec![],
            upgrade_insecure_requests: false,
            cross_origin_embedder_policy: false,
            cross_origin_opener_policy: false,
            cross_origin_resource_policy: false,
            dns_prefetch_control: false,
            frame_options: None,
            hsts: None,
            ie_no_open: false,
            origin_agent_cluster: false,
            referrer_policy: String::new(),
        };
        let compiled = SecurityHeaders::compile(&config);
        let mut headers = HeaderMap::new();
        compiled.apply_to(&mut headers);
        assert_eq!(compiled.len(), 5);
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
    }
}
