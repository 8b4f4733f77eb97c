use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tandem_core::utils::{
    DEFAULT_RELAY_URL, DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2, LEAVE_GRACE_PERIOD,
};
use tandem_core::{IceServerConfig, ParticipantIdentity};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid relay URL: {0}")]
    InvalidRelayUrl(String),

    #[error("Invalid leave grace period: {0}")]
    InvalidGracePeriod(String),
}

/// Deployment-time settings of a participant session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket URL of the signaling relay.
    pub relay_url: String,

    /// STUN/TURN servers handed to the peer connection.
    pub ice_servers: Vec<IceServerConfig>,

    /// How long a session stays in `Leaving` after the other side left,
    /// so the notice can be read before returning to the landing state.
    pub leave_grace_period: Duration,

    /// Sender tag for chat messages.
    pub identity: ParticipantIdentity,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
            leave_grace_period: LEAVE_GRACE_PERIOD,
            identity: ParticipantIdentity::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let relay_url = vars
            .get("TANDEM_RELAY_URL")
            .cloned()
            .unwrap_or(defaults.relay_url);
        if !(relay_url.starts_with("ws://") || relay_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidRelayUrl(format!(
                "TANDEM_RELAY_URL must start with ws:// or wss://, got '{}'",
                relay_url
            )));
        }

        // An empty list is allowed: host candidates only.
        let ice_servers = match vars.get("TANDEM_ICE_SERVERS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(IceServerConfig::stun)
                .collect(),
            None => defaults.ice_servers,
        };

        let leave_grace_period = match vars.get("TANDEM_LEAVE_GRACE_MS") {
            Some(value_str) => {
                let ms: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidGracePeriod(format!(
                        "TANDEM_LEAVE_GRACE_MS must be a non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                Duration::from_millis(ms)
            }
            None => defaults.leave_grace_period,
        };

        let mut identity = vars
            .get("TANDEM_DISPLAY_NAME")
            .map(|name| ParticipantIdentity::new(name.clone()))
            .unwrap_or(defaults.identity);
        if let Some(email) = vars.get("TANDEM_EMAIL") {
            identity = identity.with_email(email.clone());
        }

        Ok(Self {
            relay_url,
            ice_servers,
            leave_grace_period,
            identity,
        })
    }
}
