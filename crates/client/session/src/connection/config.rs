//! Connection configuration loaded from defaults and environment variables.

use std::env;
use std::time::Duration;

/// Settings of the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Address of the authoritative peer (`host:port`).
    pub address: String,
    /// Delay before the first reconnect attempt; doubles per attempt.
    pub reconnect_base_delay: Duration,
    /// Reconnect attempts after a failure before giving up.
    pub max_reconnect_attempts: u32,
    /// Offline queue bound. The oldest action is dropped beyond it.
    pub max_pending_actions: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7777".to_owned(),
            reconnect_base_delay: Duration::from_millis(1_000),
            max_reconnect_attempts: 5,
            max_pending_actions: 1_024,
        }
    }
}

impl ConnectionConfig {
    /// Defaults overridden by `SHARD_SERVER_ADDRESS`,
    /// `RECONNECT_BASE_DELAY_MS`, `MAX_RECONNECT_ATTEMPTS` and
    /// `MAX_PENDING_ACTIONS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(address) = env::var("SHARD_SERVER_ADDRESS")
            && !address.trim().is_empty()
        {
            config.address = address.trim().to_owned();
        }
        if let Some(millis) = read_env::<u64>("RECONNECT_BASE_DELAY_MS") {
            config.reconnect_base_delay = Duration::from_millis(millis);
        }
        if let Some(attempts) = read_env::<u32>("MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = attempts;
        }
        if let Some(pending) = read_env::<usize>("MAX_PENDING_ACTIONS") {
            config.max_pending_actions = pending.max(1);
        }

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
