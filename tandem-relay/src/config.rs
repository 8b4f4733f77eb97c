use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use tandem_core::utils::DEFAULT_BIND_ADDRESS;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the WebSocket endpoint listens on.
    pub bind_address: SocketAddr,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let raw = vars
            .get("TANDEM_BIND_ADDRESS")
            .map(String::as_str)
            .unwrap_or(DEFAULT_BIND_ADDRESS);

        let bind_address = raw.parse().map_err(|e| {
            ConfigError::InvalidBindAddress(format!(
                "TANDEM_BIND_ADDRESS must be host:port, got '{}': {}",
                raw, e
            ))
        })?;

        Ok(Self { bind_address })
    }
}
