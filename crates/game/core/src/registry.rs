//! Ownership of every shard and the player → shard assignment table.
//!
//! [`WorldShardRegistry`] is the only place that moves players between
//! shards. It guarantees a player is registered in at most one shard and
//! that combat is only ever started between players of the same shard.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::combat::{CombatError, CombatKey, CombatSession, session_key};
use crate::config::{PlacementFailure, WorldConfig};
use crate::error::{ErrorSeverity, GameError};
use crate::shard::{Shard, ShardError, ShardSystems, ShardTick};
use crate::state::{Player, PlayerId, PlayerStats, Position, ShardId};
use crate::time::Timestamp;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown shard {0}")]
    UnknownShard(ShardId),

    #[error("player {player} rejected by shard {target}: {source}")]
    PlacementRejected {
        player: PlayerId,
        target: ShardId,
        #[source]
        source: ShardError,
        /// Shard the player was put back into, if any.
        restored_to: Option<ShardId>,
    },
}

impl GameError for RegistryError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownShard(_) => ErrorSeverity::Validation,
            Self::PlacementRejected { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownShard(_) => "REGISTRY_UNKNOWN_SHARD",
            Self::PlacementRejected { .. } => "REGISTRY_PLACEMENT_REJECTED",
        }
    }
}

/// Successful result of [`WorldShardRegistry::player_change_map`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapChange {
    pub player: PlayerId,
    /// Shard the player was removed from, if they were registered anywhere.
    pub from: Option<ShardId>,
    pub to: ShardId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStats {
    pub map_id: ShardId,
    pub player_count: usize,
    pub capacity: usize,
    pub active_combats: usize,
    pub objects: usize,
    pub npcs: usize,
    pub pvp: bool,
}

impl MapStats {
    fn of(shard: &Shard) -> Self {
        Self {
            map_id: shard.id().clone(),
            player_count: shard.player_count(),
            capacity: shard.capacity(),
            active_combats: shard.combat_count(),
            objects: shard.objects().count(),
            npcs: shard.npcs().len(),
            pvp: shard.config().pvp,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_players: usize,
    pub total_combats: usize,
    pub maps: Vec<MapStats>,
}

#[derive(Clone, Debug)]
pub struct WorldShardRegistry {
    config: WorldConfig,
    shards: BTreeMap<ShardId, Shard>,
    assignments: BTreeMap<PlayerId, ShardId>,
}

impl WorldShardRegistry {
    /// Creates one empty shard per entry of the world configuration.
    pub fn new(config: WorldConfig) -> Self {
        let shards = config
            .shards
            .iter()
            .map(|(id, shard_config)| (id.clone(), Shard::new(id.clone(), shard_config.clone())))
            .collect();
        Self {
            config,
            shards,
            assignments: BTreeMap::new(),
        }
    }

    /// Builds a registry from previously restored shards.
    ///
    /// Configured shards missing from `restored` start empty. Assignments
    /// are rebuilt from shard contents; a player found in more than one
    /// shard is kept in the first (by shard id) and dropped from the rest.
    pub fn from_shards(config: WorldConfig, restored: impl IntoIterator<Item = Shard>) -> Self {
        let mut registry = Self::new(config);
        for shard in restored {
            registry.shards.insert(shard.id().clone(), shard);
        }

        let mut assignments = BTreeMap::new();
        for (shard_id, shard) in registry.shards.iter_mut() {
            let duplicates: Vec<PlayerId> = shard
                .players()
                .filter(|player| assignments.contains_key(&player.id))
                .map(|player| player.id.clone())
                .collect();
            for id in duplicates {
                tracing::warn!(
                    target: "world::registry",
                    player = %id,
                    shard = %shard_id,
                    "player restored in more than one shard; dropping duplicate"
                );
                shard.remove_player(&id);
            }
            for player in shard.players() {
                assignments.insert(player.id.clone(), shard_id.clone());
            }
        }
        registry.assignments = assignments;
        registry
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn shard(&self, id: &ShardId) -> Option<&Shard> {
        self.shards.get(id)
    }

    pub fn shard_mut(&mut self, id: &ShardId) -> Option<&mut Shard> {
        self.shards.get_mut(id)
    }

    pub fn shards(&self) -> impl Iterator<Item = &Shard> {
        self.shards.values()
    }

    /// Shard the player is currently registered in.
    pub fn player_map(&self, player: &PlayerId) -> Option<&ShardId> {
        self.assignments.get(player)
    }

    /// Spawn position for the next arrival in `shard`.
    pub fn spawn_position(&self, shard: &ShardId) -> Option<Position> {
        self.shards
            .get(shard)
            .map(|s| s.config().spawn_point(s.player_count()))
    }

    // ------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------

    /// Moves `player` into shard `to`.
    ///
    /// The player is first removed from `from` (when given) and from the
    /// shard the registry last recorded for them. If `to` is full the
    /// configured [`PlacementFailure`] policy decides where they end up.
    pub fn player_change_map(
        &mut self,
        player: Player,
        from: Option<&ShardId>,
        to: &ShardId,
    ) -> Result<MapChange, RegistryError> {
        if !self.shards.contains_key(to) {
            return Err(RegistryError::UnknownShard(to.clone()));
        }

        let id = player.id.clone();
        let mut left = None;
        if let Some(source) = from
            && let Some(shard) = self.shards.get_mut(source)
            && let Some(previous) = shard.remove_player(&id)
        {
            left = Some((source.clone(), previous));
        }
        if let Some(recorded) = self.assignments.remove(&id)
            && let Some(shard) = self.shards.get_mut(&recorded)
            && let Some(previous) = shard.remove_player(&id)
        {
            left = Some((recorded, previous));
        }

        let Some(target) = self.shards.get_mut(to) else {
            return Err(RegistryError::UnknownShard(to.clone()));
        };
        match target.add_player(player) {
            Ok(()) => {
                self.assignments.insert(id.clone(), to.clone());
                tracing::debug!(target: "world::registry", player = %id, shard = %to, "player placed");
                Ok(MapChange {
                    player: id,
                    from: left.map(|(shard, _)| shard),
                    to: to.clone(),
                })
            }
            Err(source) => {
                let restored_to = match (self.config.placement_failure, left) {
                    (PlacementFailure::Rollback, Some((previous_shard, previous))) => {
                        self.restore(previous_shard, previous)
                    }
                    _ => None,
                };
                tracing::warn!(
                    target: "world::registry",
                    player = %id,
                    shard = %to,
                    restored = ?restored_to,
                    "placement rejected"
                );
                Err(RegistryError::PlacementRejected {
                    player: id,
                    target: to.clone(),
                    source,
                    restored_to,
                })
            }
        }
    }

    fn restore(&mut self, shard_id: ShardId, player: Player) -> Option<ShardId> {
        let id = player.id.clone();
        let shard = self.shards.get_mut(&shard_id)?;
        shard.add_player(player).ok()?;
        self.assignments.insert(id, shard_id.clone());
        Some(shard_id)
    }

    /// Removes a player from whichever shard holds them (disconnect).
    pub fn remove_player(&mut self, player: &PlayerId) -> Option<(ShardId, Player)> {
        let shard_id = self.assignments.remove(player)?;
        let removed = self.shards.get_mut(&shard_id)?.remove_player(player)?;
        Some((shard_id, removed))
    }

    pub fn update_player_position(&mut self, player: &PlayerId, position: Position, now: Timestamp) -> bool {
        self.assigned_shard_mut(player)
            .is_some_and(|shard| shard.update_player_position(player, position, now))
    }

    pub fn update_player_stats(&mut self, player: &PlayerId, stats: PlayerStats, now: Timestamp) -> bool {
        self.assigned_shard_mut(player)
            .is_some_and(|shard| shard.update_player_stats(player, stats, now))
    }

    fn assigned_shard_mut(&mut self, player: &PlayerId) -> Option<&mut Shard> {
        let shard_id = self.assignments.get(player)?;
        self.shards.get_mut(shard_id)
    }

    // ------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------

    /// Starts combat if both players are assigned to the same shard.
    pub fn start_combat(
        &mut self,
        attacker: &PlayerId,
        defender: &PlayerId,
        now: Timestamp,
    ) -> Result<CombatKey, CombatError> {
        let attacker_shard = self
            .assignments
            .get(attacker)
            .ok_or_else(|| CombatError::Unassigned(attacker.clone()))?;
        let defender_shard = self
            .assignments
            .get(defender)
            .ok_or_else(|| CombatError::Unassigned(defender.clone()))?;
        if attacker_shard != defender_shard {
            return Err(CombatError::DifferentShards {
                attacker: attacker.clone(),
                attacker_shard: attacker_shard.clone(),
                defender: defender.clone(),
                defender_shard: defender_shard.clone(),
            });
        }

        let shard_id = attacker_shard.clone();
        let shard = self
            .shards
            .get_mut(&shard_id)
            .ok_or_else(|| CombatError::Unassigned(attacker.clone()))?;
        shard.start_combat(attacker, defender, now)
    }

    /// Ends the session `attacker` opened against `defender`.
    pub fn end_combat(&mut self, attacker: &PlayerId, defender: &PlayerId) -> Option<CombatSession> {
        self.assigned_shard_mut(attacker)?
            .end_combat(&session_key(attacker, defender))
    }

    pub fn record_hit(&mut self, attacker: &PlayerId, defender: &PlayerId, now: Timestamp) -> bool {
        self.assigned_shard_mut(attacker)
            .is_some_and(|shard| shard.record_hit(&session_key(attacker, defender), now))
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Updates every shard; only shards with something to report are returned.
    pub fn update_all(&mut self, now: Timestamp, delta_ms: u64) -> BTreeMap<ShardId, ShardTick> {
        self.update_all_with(now, delta_ms, &mut crate::shard::NoopSystems)
    }

    pub fn update_all_with(
        &mut self,
        now: Timestamp,
        delta_ms: u64,
        systems: &mut dyn ShardSystems,
    ) -> BTreeMap<ShardId, ShardTick> {
        self.shards
            .iter_mut()
            .filter_map(|(id, shard)| {
                let tick = shard.update_with(now, delta_ms, systems);
                (!tick.is_empty()).then(|| (id.clone(), tick))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Players currently in `shard`. Empty for an unknown shard.
    pub fn players_in_map(&self, shard: &ShardId) -> Vec<Player> {
        self.shards
            .get(shard)
            .map(|s| s.players().cloned().collect())
            .unwrap_or_default()
    }

    pub fn map_stats(&self, shard: &ShardId) -> Option<MapStats> {
        self.shards.get(shard).map(MapStats::of)
    }

    pub fn global_stats(&self) -> GlobalStats {
        let maps: Vec<MapStats> = self.shards.values().map(MapStats::of).collect();
        GlobalStats {
            total_players: maps.iter().map(|m| m.player_count).sum(),
            total_combats: maps.iter().map(|m| m.active_combats).sum(),
            maps,
        }
    }
}

impl Default for WorldShardRegistry {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}
