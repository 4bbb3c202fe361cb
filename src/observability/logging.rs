//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config, `RUST_LOG` wins when set
//! - Per-request context (request id, user id) lives in spans, not globals

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Environment, ObservabilityConfig};

/// Initialize the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig, environment: Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("feed_gateway={level},tower_http={level}", level = config.log_level).into()
    });

    let json = config.json_logs.unwrap_or(environment.is_production());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
