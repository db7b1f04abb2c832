use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::router::EndpointKind;

/// One configured backend endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointEntry {
    /// Stable identity used for routing and de-duplication
    pub name: String,

    /// Connection string / URI handed to the connection factory
    pub url: String,

    /// Primary endpoints use the strong reconnection policy, secondary the
    /// weak one (default: primary)
    #[serde(default)]
    pub kind: EndpointKind,
}

impl EndpointEntry {
    /// Parse a `name=url` pair; a bare URL names the endpoint after itself
    fn parse(entry: &str, kind: EndpointKind) -> Self {
        match entry.split_once('=') {
            Some((name, url)) => Self {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
                kind,
            },
            None => Self {
                name: entry.trim().to_string(),
                url: entry.trim().to_string(),
                kind,
            },
        }
    }
}

/// Pool sizing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Fixed number of connections per endpoint
    #[serde(default = "default_connection_count")]
    pub connections_per_endpoint: usize,
}

fn default_connection_count() -> usize {
    5
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            connections_per_endpoint: default_connection_count(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend endpoints, fixed for the process lifetime
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,

    /// Pool sizing
    #[serde(default)]
    pub pool: PoolSettings,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self {
            endpoints: Vec::new(),
            pool: PoolSettings::default(),
        }
    }

    /// Check the invariants a broker can be built from
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            anyhow::bail!("at least one endpoint must be configured");
        }
        if self.pool.connections_per_endpoint == 0 {
            anyhow::bail!("connections_per_endpoint must be greater than zero");
        }

        let mut names: Vec<&str> = self.endpoints.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.endpoints.len() {
            anyhow::bail!("endpoint names must be unique");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// - HUBPOOL_ENDPOINTS (comma-separated `name=url` pairs or bare URLs,
///   primary endpoints)
/// - HUBPOOL_SECONDARY_ENDPOINTS (same format, secondary endpoints; optional)
/// - HUBPOOL_CONNECTION_COUNT (connections per endpoint; optional)
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let mut config = Config::new();

    let primary = std::env::var("HUBPOOL_ENDPOINTS")
        .context("HUBPOOL_ENDPOINTS environment variable not set")?;

    config.endpoints.extend(
        primary
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|entry| EndpointEntry::parse(entry, EndpointKind::Primary)),
    );

    if let Ok(secondary) = std::env::var("HUBPOOL_SECONDARY_ENDPOINTS") {
        config.endpoints.extend(
            secondary
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|entry| EndpointEntry::parse(entry, EndpointKind::Secondary)),
        );
    }

    if config.endpoints.is_empty() {
        anyhow::bail!("HUBPOOL_ENDPOINTS contains no valid endpoints");
    }

    if let Ok(count) = std::env::var("HUBPOOL_CONNECTION_COUNT") {
        config.pool.connections_per_endpoint = count
            .parse()
            .context("HUBPOOL_CONNECTION_COUNT must be a positive integer")?;
    }

    Ok(config)
}

/// Load configuration from file or environment
///
/// Tries the YAML file when a path is given, otherwise falls back to
/// environment variables.
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config = if let Some(path) = config_path {
        load_from_yaml(path)?
    } else {
        load_from_env()?
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
endpoints:
  - name: east
    url: tcp://east.example.com:5001
    kind: primary
  - name: west
    url: tcp://west.example.com:5001
    kind: secondary

pool:
  connections_per_endpoint: 8
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].name, "east");
        assert_eq!(config.endpoints[0].kind, EndpointKind::Primary);
        assert_eq!(config.endpoints[1].kind, EndpointKind::Secondary);
        assert_eq!(config.pool.connections_per_endpoint, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let yaml = r#"
endpoints:
  - name: only
    url: tcp://only.example.com:5001
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Kind defaults to primary, pool sizing to the default count
        assert_eq!(config.endpoints[0].kind, EndpointKind::Primary);
        assert_eq!(config.pool.connections_per_endpoint, 5);
    }

    #[test]
    fn test_validation_rejects_empty_and_duplicates() {
        let config = Config::new();
        assert!(config.validate().is_err());

        let yaml = r#"
endpoints:
  - name: east
    url: tcp://a:5001
  - name: east
    url: tcp://b:5001
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_entry_parse() {
        let entry = EndpointEntry::parse("east=tcp://east:5001", EndpointKind::Primary);
        assert_eq!(entry.name, "east");
        assert_eq!(entry.url, "tcp://east:5001");

        let entry = EndpointEntry::parse("tcp://bare:5001", EndpointKind::Secondary);
        assert_eq!(entry.name, "tcp://bare:5001");
        assert_eq!(entry.url, "tcp://bare:5001");
        assert_eq!(entry.kind, EndpointKind::Secondary);
    }
}
