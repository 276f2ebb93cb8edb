//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying the environment override
//! for the data source, and validating everything up front with
//! clear error messages.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, DATA_SOURCE_ENV};
use crate::adapters::postgres::{KNOWN_COLLECTORS, PgConnector};

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content, std::env::var(DATA_SOURCE_ENV).ok())?;

  info!(
    collectors = ?config.collectors.enabled,
    listen = %config.web.listen_address,
    policy = ?config.database.connection_policy,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse TOML, apply the data source override, and validate.
pub fn parse_config(content: &str, data_source_override: Option<String>) -> Result<AppConfig> {
  let mut config: AppConfig = toml::from_str(content)
    .with_context(|| "Failed to parse config.toml")?;

  if let Some(url) = data_source_override.filter(|u| !u.is_empty()) {
    config.database.data_source_url = url;
  }

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A parsable PostgreSQL data source URL
/// - A listen address and an absolute telemetry path
/// - Known collector names
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.database.data_source_url.is_empty(),
    "No data source configured: set database.data_source_url or {}",
    DATA_SOURCE_ENV
  );
  PgConnector::from_url(&config.database.data_source_url)
    .context("Invalid data source URL")?;

  config
    .web
    .listen_address
    .parse::<SocketAddr>()
    .with_context(|| format!("Invalid listen address: {}", config.web.listen_address))?;

  anyhow::ensure!(
    config.web.telemetry_path.starts_with('/'),
    "telemetry_path must start with '/', got {}",
    config.web.telemetry_path
  );
  anyhow::ensure!(
    !matches!(config.web.telemetry_path.as_str(), "/live" | "/ready"),
    "telemetry_path {} collides with a health endpoint",
    config.web.telemetry_path
  );

  for name in &config.collectors.enabled {
    anyhow::ensure!(
      KNOWN_COLLECTORS.contains(&name.as_str()),
      "Unknown collector {} (known: {})",
      name,
      KNOWN_COLLECTORS.join(", ")
    );
  }

  Ok(())
}
