//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{Environment, GatewayConfig, UnknownEnvironment};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `environment` from the file.
pub const ENV_VAR: &str = "APP_ENV";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Environment(UnknownEnvironment),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Environment(e) => write!(f, "Environment error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Resolve the final configuration: file (or defaults), then `APP_ENV`,
/// then an explicit override (CLI flag), then validation.
pub fn resolve_config(
    path: Option<&Path>,
    env_override: Option<Environment>,
) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => GatewayConfig::default(),
    };

    if let Ok(value) = std::env::var(ENV_VAR) {
        config.environment = value.parse().map_err(ConfigError::Environment)?;
    }
    if let Some(environment) = env_override {
        config.environment = environment;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
