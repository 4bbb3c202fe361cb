//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, APP_ENV / CLI override)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → consumed once at startup to build the Gateway
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload, so the
//!   environment-selected security profile cannot change mid-process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::{
    CorsConfig, Environment, GatewayConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig,
    RateLimitSettings, SessionConfig,
};
