//! Runtime configuration loaded from defaults and environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use game_core::{PlacementFailure, WorldConfig};

/// Configuration of the world worker and its storage.
#[derive(Debug, Clone)]
pub struct WorldRuntimeConfig {
    pub world: WorldConfig,
    /// Interval between two `update_all` passes.
    pub tick_interval: Duration,
    /// Checkpoint every N ticks. `0` disables periodic checkpoints.
    pub checkpoint_every_ticks: u64,
    /// Directory of the file store. `None` uses the platform data dir.
    pub data_dir: Option<PathBuf>,
    /// Use the file store. When disabled the world lives in memory only.
    pub enable_persistence: bool,
    pub command_buffer_size: usize,
    pub event_buffer_size: usize,
}

impl Default for WorldRuntimeConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            tick_interval: Duration::from_millis(100),
            checkpoint_every_ticks: 50,
            data_dir: None,
            enable_persistence: true,
            command_buffer_size: 64,
            event_buffer_size: 256,
        }
    }
}

impl WorldRuntimeConfig {
    /// Defaults overridden by `WORLD_TICK_MS`, `CHECKPOINT_EVERY_TICKS`,
    /// `WORLD_DATA_DIR`, `ENABLE_PERSISTENCE` and `PLACEMENT_FAILURE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(millis) = read_env::<u64>("WORLD_TICK_MS") {
            config.tick_interval = Duration::from_millis(millis.max(1));
        }
        if let Some(ticks) = read_env::<u64>("CHECKPOINT_EVERY_TICKS") {
            config.checkpoint_every_ticks = ticks;
        }
        if let Ok(dir) = env::var("WORLD_DATA_DIR")
            && !dir.trim().is_empty()
        {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(enable) = read_env::<bool>("ENABLE_PERSISTENCE") {
            config.enable_persistence = enable;
        }
        if let Ok(raw) = env::var("PLACEMENT_FAILURE") {
            match raw.parse::<PlacementFailure>() {
                Ok(policy) => config.world.placement_failure = policy,
                Err(_) => tracing::warn!(
                    target: "runtime::config",
                    value = %raw,
                    "unknown PLACEMENT_FAILURE; keeping default"
                ),
            }
        }

        config
    }

    /// Configured data directory, falling back to the platform default.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Platform data directory for world snapshots.
///
/// - Linux: `~/.local/share/shards/world`
/// - macOS: `~/Library/Application Support/shards/world`
/// - Windows: `%APPDATA%\shards\world`
/// - Fallback: `./save_data/world`
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "shards")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./save_data"))
        .join("world")
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
