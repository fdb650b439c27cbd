//! Server configuration loaded from the environment

use config::{Config, ConfigError, Environment, Map};
use linkshelf_core::{Id, User};
use serde::Deserialize;
use std::time::Duration;

/// `DATABASE_URL` value that selects the map-based store
pub const MEMORY_DATABASE_URL: &str = "memory";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_address: String,
    pub demo_user_id: Id,
    #[serde(default)]
    pub static_dir: Option<String>,
    pub proxy_connect_timeout_secs: u64,
    pub proxy_timeout_secs: u64,
    pub proxy_max_redirects: usize,
    #[serde(default)]
    pub proxy_allowed_hosts: Vec<String>,
}

/// Which storage backend the database URL asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sqlite(String),
}

impl ServerConfig {
    /// Load from process environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default())
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_vars(vars: Map<String, String>) -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default().source(Some(vars)))
    }

    fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("bind_address", "0.0.0.0:5000")?
            .set_default("demo_user_id", User::DEMO_ID)?
            .set_default("proxy_connect_timeout_secs", 5_i64)?
            .set_default("proxy_timeout_secs", 10_i64)?
            .set_default("proxy_max_redirects", 5_i64)?
            .add_source(
                env.try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("proxy_allowed_hosts"),
            )
            .build()?;

        let mut config: ServerConfig = settings.try_deserialize()?;
        if config.database_url.trim().is_empty() {
            return Err(ConfigError::Message("DATABASE_URL must not be empty".into()));
        }
        config.proxy_allowed_hosts = config
            .proxy_allowed_hosts
            .into_iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Ok(config)
    }

    pub fn store_kind(&self) -> StoreKind {
        if self.database_url == MEMORY_DATABASE_URL {
            StoreKind::Memory
        } else {
            StoreKind::Sqlite(self.database_url.clone())
        }
    }

    pub fn proxy_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_connect_timeout_secs)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_database_url_is_required() {
        let err = ServerConfig::from_vars(vars(&[("BIND_ADDRESS", "127.0.0.1:8080")]));
        assert!(err.is_err());
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_vars(vars(&[("DATABASE_URL", "memory")])).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert_eq!(config.demo_user_id, 1);
        assert_eq!(config.proxy_max_redirects, 5);
        assert_eq!(config.proxy_timeout(), Duration::from_secs(10));
        assert!(config.proxy_allowed_hosts.is_empty());
        assert!(config.static_dir.is_none());
        assert_eq!(config.store_kind(), StoreKind::Memory);
    }

    #[test]
    fn test_overrides_and_allow_list() {
        let config = ServerConfig::from_vars(vars(&[
            ("DATABASE_URL", "sqlite://data/linkshelf.db"),
            ("DEMO_USER_ID", "7"),
            ("PROXY_ALLOWED_HOSTS", "Example.com, notion.so"),
        ]))
        .unwrap();
        assert_eq!(config.demo_user_id, 7);
        assert_eq!(config.proxy_allowed_hosts, vec!["example.com", "notion.so"]);
        assert_eq!(
            config.store_kind(),
            StoreKind::Sqlite("sqlite://data/linkshelf.db".to_string())
        );
    }
}
