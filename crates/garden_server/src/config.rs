//! Environment-driven server configuration.
//!
//! Recognized variables:
//! - `GARDEN_ADDR` listen address, default `127.0.0.1:8080`
//! - `GARDEN_DB_PATH` SQLite file, default `garden.sqlite3`
//! - `GARDEN_LOG_LEVEL` default [`default_log_level`]
//! - `GARDEN_LOG_DIR` absolute directory for rotated log files (stderr when unset)
//! - `GARDEN_PASSWORD` enables the login gate
//!
//! Empty values count as unset.

use garden_core::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_DB_PATH: &str = "garden.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    InvalidAddr {
        value: String,
        source: AddrParseError,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddr { value, source } => {
                write!(f, "invalid GARDEN_ADDR `{value}`: {source}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidAddr { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub password: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let raw_addr = var("GARDEN_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::InvalidAddr {
                value: raw_addr.clone(),
                source,
            })?;

        Ok(Self {
            addr,
            db_path: var("GARDEN_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            log_level: var("GARDEN_LOG_LEVEL").unwrap_or_else(|| default_log_level().to_string()),
            log_dir: var("GARDEN_LOG_DIR"),
            password: var("GARDEN_PASSWORD"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ServerConfig, DEFAULT_DB_PATH};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.log_level, garden_core::default_log_level());
        assert_eq!(config.log_dir, None);
        assert_eq!(config.password, None);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("GARDEN_ADDR", "0.0.0.0:9000"),
            ("GARDEN_DB_PATH", "/var/lib/garden/items.db"),
            ("GARDEN_LOG_LEVEL", "warn"),
            ("GARDEN_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/garden/items.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn empty_password_disables_login() {
        let config = ServerConfig::from_lookup(lookup(&[("GARDEN_PASSWORD", "  ")])).unwrap();
        assert_eq!(config.password, None);
    }

    #[test]
    fn invalid_addr_is_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("GARDEN_ADDR", "localhost")])).unwrap_err();
        let ConfigError::InvalidAddr { value, .. } = err;
        assert_eq!(value, "localhost");
    }
}
