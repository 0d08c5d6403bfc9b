//! Binary configuration: who the local player is and where they start.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use game_core::ShardId;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub player_id: String,
    pub faction: String,
    pub start_map: ShardId,
    /// Interval between two global-stats log lines.
    pub stats_interval: Duration,
    /// Skip connecting and play against the local world only.
    pub offline: bool,
    /// Log directory. `None` uses the platform cache dir.
    pub log_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            player_id: "player-1".to_owned(),
            faction: "neutral".to_owned(),
            start_map: ShardId::from("v1"),
            stats_interval: Duration::from_secs(30),
            offline: false,
            log_dir: None,
        }
    }
}

impl ClientConfig {
    /// Environment variables:
    /// - `PLAYER_ID` (default: `player-1`)
    /// - `PLAYER_FACTION` (default: `neutral`)
    /// - `START_MAP` (default: `v1`)
    /// - `STATS_INTERVAL_SECS` (default: 30, min 1)
    /// - `OFFLINE_MODE` (default: false)
    /// - `LOG_DIR` (default: platform cache dir)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(id) = read_string("PLAYER_ID") {
            config.player_id = id;
        }
        if let Some(faction) = read_string("PLAYER_FACTION") {
            config.faction = faction;
        }
        if let Some(map) = read_string("START_MAP") {
            config.start_map = ShardId::from(map);
        }
        if let Some(secs) = read_env::<u64>("STATS_INTERVAL_SECS") {
            config.stats_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(offline) = read_env::<bool>("OFFLINE_MODE") {
            config.offline = offline;
        }
        config.log_dir = read_string("LOG_DIR").map(PathBuf::from);

        config
    }
}

fn read_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
