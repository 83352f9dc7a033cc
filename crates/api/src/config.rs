//! Server configuration loaded from the environment.

use pvz_infra::DatabaseConfig;
use pvz_infra::config::ConfigError;

/// Everything the binary needs to wire services and bind a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Postgres-backed stores when `true`, in-memory otherwise.
    pub use_persistent_stores: bool,
    /// Run the idempotent schema DDL on startup (persistent stores only).
    pub bootstrap_schema: bool,
    /// HS256 signing secret (`SECRET_KEY`).
    pub jwt_secret: Option<String>,
    pub database: DatabaseConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
            use_persistent_stores: false,
            bootstrap_schema: false,
            jwt_secret: None,
            database: DatabaseConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read `SERVER_ADDRESS`, `SERVER_PORT`, `USE_PERSISTENT_STORES`,
    /// `DB_BOOTSTRAP_SCHEMA`, `SECRET_KEY` and the database variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("SERVER_PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "SERVER_PORT",
                expected: "a TCP port",
                value: v,
            })?,
            None => defaults.port,
        };

        Ok(Self {
            address: get("SERVER_ADDRESS").unwrap_or(defaults.address),
            port,
            use_persistent_stores: flag(get("USE_PERSISTENT_STORES")),
            bootstrap_schema: flag(get("DB_BOOTSTRAP_SCHEMA")),
            jwt_secret: get("SECRET_KEY"),
            database: DatabaseConfig::from_lookup(&lookup)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

fn flag(raw: Option<String>) -> bool {
    raw.map(|v| v.trim().to_ascii_lowercase())
        .is_some_and(|v| v == "true" || v == "1")
}
