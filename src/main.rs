//! Feed gateway binary.
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http server (request id, trace)
//!                        │
//!                        ▼
//!                    Gateway pipeline
//!                    cors preflight → inspect → route → session gate → rate limit
//!                        │
//!                        ▼
//!                    handler ──▶ session cache
//!                        │
//!                        ▼
//!     ◀───────────── error responder + security / CORS / rate-limit headers
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use feed_gateway::config::{resolve_config, Environment};
use feed_gateway::handlers;
use feed_gateway::lifecycle::{crash, signals, Shutdown};
use feed_gateway::observability::{logging, metrics};
use feed_gateway::security::RateLimiter;
use feed_gateway::session::{MemorySessionCache, SessionGate};
use feed_gateway::{Gateway, HttpServer};

#[derive(Debug, Parser)]
#[command(
    name = "feed-gateway",
    version,
    about = "Request pipeline for the feed application",
    long_about = "Request pipeline for the feed application.\n\n\
        This binary serves sessions from an in-memory cache that nothing \
        populates, so every protected route answers 401 or redirects to \
        sign-in. To authenticate real sessions, embed the library and pass \
        a SessionCache backed by your session store to SessionGate::new."
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Runtime environment; overrides the file and APP_ENV.
    #[arg(short, long)]
    env: Option<Environment>,

    /// Listen address; overrides the file.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = resolve_config(cli.config.as_deref(), cli.env)?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability, config.environment);
    crash::install_panic_hook();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        bind_address = %config.listener.bind_address,
        "feed-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // No external cache client is wired in and nothing writes sessions, so
    // protected routes reject every caller in this binary.
    tracing::warn!(
        "Using an empty in-memory session cache; protected routes will reject all sessions"
    );
    let cache = Arc::new(MemorySessionCache::new());
    let gate = Arc::new(SessionGate::new(cache, &config.session));
    let limiter = Arc::new(RateLimiter::new());
    let sweep_every = Duration::from_secs(config.rate_limit.sweep_interval_secs);

    let gateway = Gateway::builder(config.clone(), gate.clone())
        .routes(handlers::routes(gate))
        .limiter(limiter.clone())
        .build()?;

    let shutdown = Shutdown::new();
    crash::supervise(
        "rate-limit-sweeper",
        limiter.spawn_sweeper(sweep_every, shutdown.subscribe()),
    );
    crash::supervise(
        "signal-listener",
        signals::spawn_signal_listener(shutdown.clone()),
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(Arc::new(gateway)).run(listener, shutdown.subscribe());
    let server = tokio::spawn(server);
    if let Some(result) = crash::join_or_exit("http-server", server).await {
        result?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
