use crate::errors::config_error::ConfigError;
use std::env;
use std::time::Duration;

/// Tunables for the presence protocol and the session lifetime clock.
#[derive(Clone, Debug)]
pub struct PresenceConfig {
    /// Heartbeat emission interval.
    pub heartbeat_interval: Duration,
    /// A peer unheard from for this long is reaped. Must be at least twice
    /// the heartbeat interval so one lost heartbeat is tolerated.
    pub peer_timeout: Duration,
    /// Initial discovery window before a context that got no replies
    /// settles into steady state.
    pub init_window: Duration,
    /// Absolute session lifetime, measured from login, never refreshed.
    pub max_lifetime: Duration,
    /// Remote session-termination endpoint, if any.
    pub terminate_url: Option<String>,
}

impl PresenceConfig {
    /// Reads configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<PresenceConfig, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = PresenceConfig::default();

        let config = PresenceConfig {
            heartbeat_interval: env_millis("PRESENCE_HEARTBEAT_MS", defaults.heartbeat_interval)?,
            peer_timeout: env_millis("PRESENCE_PEER_TIMEOUT_MS", defaults.peer_timeout)?,
            init_window: env_millis("PRESENCE_INIT_WINDOW_MS", defaults.init_window)?,
            max_lifetime: env_millis("SESSION_MAX_LIFETIME_MS", defaults.max_lifetime)?,
            terminate_url: env::var("SESSION_TERMINATE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
        };
        config.validate()
    }

    pub fn validate(self) -> Result<PresenceConfig, ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroHeartbeatInterval);
        }
        if self.peer_timeout < self.heartbeat_interval * 2 {
            return Err(ConfigError::PeerTimeoutTooShort);
        }
        Ok(self)
    }

    pub(crate) fn peer_timeout_ms(&self) -> i64 {
        self.peer_timeout.as_millis() as i64
    }

    pub(crate) fn max_lifetime_ms(&self) -> i64 {
        self.max_lifetime.as_millis() as i64
    }

    /// Persisted peer records and teardown markers older than this are
    /// pruned or ignored by whichever peer notices them.
    pub(crate) fn record_ttl_ms(&self) -> i64 {
        2 * self.peer_timeout_ms()
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        PresenceConfig {
            heartbeat_interval: Duration::from_secs(5),
            peer_timeout: Duration::from_secs(12),
            init_window: Duration::from_secs(2),
            max_lifetime: Duration::from_secs(4 * 60 * 60),
            terminate_url: None,
        }
    }
}

fn env_millis(var: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .or(Err(ConfigError::InvalidValue(var.to_string()))),
        Err(_) => Ok(default),
    }
}
