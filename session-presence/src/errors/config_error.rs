use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
    #[error("Heartbeat interval must not be zero")]
    ZeroHeartbeatInterval,
    #[error("Peer timeout must be at least twice the heartbeat interval")]
    PeerTimeoutTooShort,
}
