use std::env;
use std::net::SocketAddr;

use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://enrolr.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
}

impl AppConfig {
    /// Reads `DATABASE_URL`, `BIND_ADDR` and `DB_MAX_CONNECTIONS`, falling
    /// back to defaults for any that are unset.
    pub fn new_from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid { name: "BIND_ADDR", value: bind_addr })?;

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", value: raw }),
            },
        };

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
        })
    }
}
