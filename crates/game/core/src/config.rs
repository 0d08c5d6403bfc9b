//! World configuration constants and per-shard defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::{Position, SafeZone, ShardId};

/// Static configuration of a single shard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardConfig {
    pub capacity: usize,
    pub safe_zones: Vec<SafeZone>,
    pub spawn_points: Vec<Position>,
    /// Contested shard: no safe zones, combat everywhere.
    #[serde(default)]
    pub pvp: bool,
}

impl ShardConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            safe_zones: Vec::new(),
            spawn_points: Vec::new(),
            pvp: false,
        }
    }

    #[must_use]
    pub fn with_safe_zone(mut self, zone: SafeZone) -> Self {
        self.safe_zones.push(zone);
        self
    }

    #[must_use]
    pub fn with_spawn_point(mut self, spawn: Position) -> Self {
        self.spawn_points.push(spawn);
        self
    }

    /// Marks the shard as contested and clears its safe zones.
    #[must_use]
    pub fn contested(mut self) -> Self {
        self.pvp = true;
        self.safe_zones.clear();
        self
    }

    /// Spawn point for the `n`-th arrival, cycling through the list.
    pub fn spawn_point(&self, n: usize) -> Position {
        if self.spawn_points.is_empty() {
            return Position::ORIGIN;
        }
        self.spawn_points[n % self.spawn_points.len()]
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self::new(WorldConfig::DEFAULT_CAPACITY)
    }
}

/// What happens to a player whose destination shard rejects them.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PlacementFailure {
    /// Put the player back into the shard they were leaving.
    #[default]
    Rollback,
    /// Leave the player assigned to no shard.
    #[strum(serialize = "unassign", serialize = "leave_unassigned")]
    LeaveUnassigned,
}

/// World-wide configuration: the fixed shard table plus tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldConfig {
    pub shards: BTreeMap<ShardId, ShardConfig>,
    pub placement_failure: PlacementFailure,
}

impl WorldConfig {
    /// Inactivity after which a combat session is dropped.
    pub const COMBAT_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_CAPACITY: usize = 100;
    pub const CONTESTED_CAPACITY: usize = 50;
    pub const SPAWN_SAFE_RADIUS: f64 = 200.0;
    pub const CONTESTED_SHARD: &'static str = "pvp";

    /// Empty world with no shards.
    pub fn empty() -> Self {
        Self {
            shards: BTreeMap::new(),
            placement_failure: PlacementFailure::default(),
        }
    }

    #[must_use]
    pub fn with_shard(mut self, id: impl Into<ShardId>, config: ShardConfig) -> Self {
        self.shards.insert(id.into(), config);
        self
    }

    #[must_use]
    pub fn with_placement_failure(mut self, policy: PlacementFailure) -> Self {
        self.placement_failure = policy;
        self
    }

    /// Configuration for `id`, falling back to a plain default shard.
    pub fn shard_config(&self, id: &ShardId) -> ShardConfig {
        self.shards.get(id).cloned().unwrap_or_default()
    }

    fn home_shard(spawn: Position) -> ShardConfig {
        ShardConfig::new(Self::DEFAULT_CAPACITY)
            .with_spawn_point(spawn)
            .with_safe_zone(SafeZone::around(spawn, Self::SPAWN_SAFE_RADIUS))
    }
}

impl Default for WorldConfig {
    /// Three home shards with a safe zone around their spawn, plus the
    /// contested `pvp` shard.
    fn default() -> Self {
        Self::empty()
            .with_shard("v1", Self::home_shard(Position::new(1_000.0, 1_000.0)))
            .with_shard("v2", Self::home_shard(Position::new(9_000.0, 1_000.0)))
            .with_shard("v3", Self::home_shard(Position::new(5_000.0, 9_000.0)))
            .with_shard(
                Self::CONTESTED_SHARD,
                ShardConfig::new(Self::CONTESTED_CAPACITY)
                    .with_spawn_point(Position::new(5_000.0, 5_000.0))
                    .with_spawn_point(Position::new(4_000.0, 6_000.0))
                    .contested(),
            )
    }
}
