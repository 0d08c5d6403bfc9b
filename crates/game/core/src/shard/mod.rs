//! A single independently simulated map instance.
//!
//! A [`Shard`] owns its players, world objects, NPC records and combat
//! sessions. It never reaches for the wall clock: every operation that
//! needs "now" takes it as an argument.
//!
//! Invariants maintained here:
//! - `players.len() <= config.capacity` at all times.
//! - A combat session exists only while both participants are registered in
//!   this shard, and the defender stood outside every safe zone when it was
//!   created.
mod error;
mod snapshot;
mod systems;

pub use error::{ShardError, SnapshotError};
pub use snapshot::ShardSnapshot;
pub use systems::{NoopSystems, ShardSystems};

use std::collections::BTreeMap;

use crate::combat::{CombatError, CombatKey, CombatSession, session_key};
use crate::config::ShardConfig;
use crate::state::{NpcState, ObjectId, Player, PlayerId, PlayerStats, Position, ShardId, WorldObject};
use crate::time::Timestamp;

/// Outcome of one [`Shard::update`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShardTick {
    /// Combat sessions dropped for inactivity.
    pub expired_combats: Vec<CombatKey>,
    /// Objects that became active again during this tick.
    pub respawned_objects: Vec<ObjectId>,
}

impl ShardTick {
    pub fn is_empty(&self) -> bool {
        self.expired_combats.is_empty() && self.respawned_objects.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Shard {
    id: ShardId,
    config: ShardConfig,
    players: BTreeMap<PlayerId, Player>,
    objects: BTreeMap<ObjectId, WorldObject>,
    npcs: Vec<NpcState>,
    combats: BTreeMap<CombatKey, CombatSession>,
}

impl Shard {
    pub fn new(id: impl Into<ShardId>, config: ShardConfig) -> Self {
        Self {
            id: id.into(),
            config,
            players: BTreeMap::new(),
            objects: BTreeMap::new(),
            npcs: Vec::new(),
            combats: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &ShardId {
        &self.id
    }

    pub fn config(&self) -> &ShardConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.capacity
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Registers `player`, or replaces the record if the id is already here.
    ///
    /// Replacing an existing record never counts against capacity twice.
    pub fn add_player(&mut self, player: Player) -> Result<(), ShardError> {
        if !self.players.contains_key(&player.id) && self.is_full() {
            return Err(ShardError::AtCapacity {
                shard: self.id.clone(),
                capacity: self.config.capacity,
            });
        }
        self.players.insert(player.id.clone(), player);
        Ok(())
    }

    /// Removes a player and every combat session they take part in.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let removed = self.players.remove(id)?;
        self.combats.retain(|_, session| !session.involves(id));
        Some(removed)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn contains_player(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Moves a registered player. Returns `false` if the player is not here.
    pub fn update_player_position(&mut self, id: &PlayerId, position: Position, now: Timestamp) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.position = position;
                player.last_update = now;
                true
            }
            None => false,
        }
    }

    /// Replaces a registered player's stats. Returns `false` if the player is not here.
    pub fn update_player_stats(&mut self, id: &PlayerId, stats: PlayerStats, now: Timestamp) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.stats = stats;
                player.last_update = now;
                true
            }
            None => false,
        }
    }

    pub fn is_in_safe_zone(&self, position: &Position) -> bool {
        self.config
            .safe_zones
            .iter()
            .any(|zone| zone.contains(position))
    }

    // ------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------

    /// Opens a combat session between two players of this shard.
    ///
    /// Starting a session that already exists refreshes its last hit.
    pub fn start_combat(
        &mut self,
        attacker: &PlayerId,
        defender: &PlayerId,
        now: Timestamp,
    ) -> Result<CombatKey, CombatError> {
        if attacker == defender {
            return Err(CombatError::SelfTarget(attacker.clone()));
        }
        if !self.players.contains_key(attacker) {
            return Err(self.unknown(attacker));
        }
        let defender_position = match self.players.get(defender) {
            Some(player) => player.position,
            None => return Err(self.unknown(defender)),
        };
        if self.is_in_safe_zone(&defender_position) {
            return Err(CombatError::SafeZone {
                shard: self.id.clone(),
                defender: defender.clone(),
                position: defender_position,
            });
        }

        let key = session_key(attacker, defender);
        self.combats
            .entry(key.clone())
            .and_modify(|session| session.last_hit = now)
            .or_insert_with(|| CombatSession::new(attacker.clone(), defender.clone(), now));
        Ok(key)
    }

    pub fn end_combat(&mut self, key: &CombatKey) -> Option<CombatSession> {
        self.combats.remove(key)
    }

    /// Refreshes the inactivity timer of a session. Returns `false` if unknown.
    pub fn record_hit(&mut self, key: &CombatKey, now: Timestamp) -> bool {
        match self.combats.get_mut(key) {
            Some(session) => {
                session.last_hit = now;
                true
            }
            None => false,
        }
    }

    pub fn combat(&self, key: &CombatKey) -> Option<&CombatSession> {
        self.combats.get(key)
    }

    pub fn combats(&self) -> impl Iterator<Item = &CombatSession> {
        self.combats.values()
    }

    pub fn combat_count(&self) -> usize {
        self.combats.len()
    }

    fn unknown(&self, player: &PlayerId) -> CombatError {
        CombatError::UnknownParticipant {
            shard: self.id.clone(),
            player: player.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Objects and NPCs
    // ------------------------------------------------------------------

    pub fn upsert_object(&mut self, object: WorldObject) {
        self.objects.insert(object.id.clone(), object);
    }

    pub fn remove_object(&mut self, id: &ObjectId) -> Option<WorldObject> {
        self.objects.remove(id)
    }

    pub fn object(&self, id: &ObjectId) -> Option<&WorldObject> {
        self.objects.get(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &WorldObject> {
        self.objects.values()
    }

    /// Objects whose `last_update` is strictly after `since`.
    pub fn objects_updated_since(&self, since: Timestamp) -> Vec<WorldObject> {
        self.objects
            .values()
            .filter(|object| object.last_update > since)
            .cloned()
            .collect()
    }

    pub fn add_npc(&mut self, npc: NpcState) {
        self.npcs.push(npc);
    }

    pub fn npcs(&self) -> &[NpcState] {
        &self.npcs
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advances the shard with no external systems attached.
    pub fn update(&mut self, now: Timestamp, delta_ms: u64) -> ShardTick {
        self.update_with(now, delta_ms, &mut NoopSystems)
    }

    /// Advances the shard: combat GC, then NPCs, then resources.
    pub fn update_with(
        &mut self,
        now: Timestamp,
        delta_ms: u64,
        systems: &mut dyn ShardSystems,
    ) -> ShardTick {
        let mut tick = ShardTick::default();

        self.combats.retain(|key, session| {
            if session.is_stale(now) {
                tick.expired_combats.push(key.clone());
                false
            } else {
                true
            }
        });
        if !tick.expired_combats.is_empty() {
            tracing::debug!(
                target: "world::shard",
                shard = %self.id,
                expired = tick.expired_combats.len(),
                "dropped stale combat sessions"
            );
        }

        systems.tick_npcs(&self.id, &mut self.npcs, now, delta_ms);

        for object in self.objects.values_mut() {
            if object.active {
                continue;
            }
            if let Some(respawn_at) = object.respawn_at
                && respawn_at <= now
            {
                object.active = true;
                object.respawn_at = None;
                object.last_update = now;
                tick.respawned_objects.push(object.id.clone());
            }
        }
        systems.tick_resources(&self.id, &mut self.objects, now, delta_ms);

        tick
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn serialize(&self) -> ShardSnapshot {
        ShardSnapshot {
            map_id: self.id.clone(),
            players: self
                .players
                .iter()
                .map(|(id, player)| (id.clone(), player.clone()))
                .collect(),
            objects: self
                .objects
                .iter()
                .map(|(id, object)| (id.clone(), object.clone()))
                .collect(),
            npcs: self.npcs.clone(),
            active_combats: self
                .combats
                .iter()
                .map(|(key, session)| (key.clone(), session.clone()))
                .collect(),
            config: self.config.clone(),
        }
    }

    /// Rebuilds a shard from a snapshot.
    ///
    /// Fails if the snapshot holds more players than its capacity. Combat
    /// sessions whose participants are missing are dropped.
    pub fn deserialize(snapshot: ShardSnapshot) -> Result<Self, SnapshotError> {
        let ShardSnapshot {
            map_id,
            players,
            objects,
            npcs,
            active_combats,
            config,
        } = snapshot;

        let players: BTreeMap<_, _> = players.into_iter().collect();
        if players.len() > config.capacity {
            return Err(SnapshotError::OverCapacity {
                shard: map_id,
                players: players.len(),
                capacity: config.capacity,
            });
        }

        let combats = active_combats
            .into_iter()
            .filter(|(_, session)| {
                players.contains_key(&session.attacker) && players.contains_key(&session.defender)
            })
            .collect();

        Ok(Self {
            id: map_id,
            config,
            players,
            objects: objects.into_iter().collect(),
            npcs,
            combats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SafeZone;

    fn open_shard(capacity: usize) -> Shard {
        Shard::new("test", ShardConfig::new(capacity))
    }

    fn zoned_shard() -> Shard {
        Shard::new(
            "zoned",
            ShardConfig::new(10).with_safe_zone(SafeZone::new(0.0, 0.0, 100.0, 100.0)),
        )
    }

    fn player(id: &str, x: f64, y: f64) -> Player {
        Player::new(id, "blue", Position::new(x, y))
    }

    #[test]
    fn add_player_rejects_when_full() {
        let mut shard = open_shard(2);
        shard.add_player(player("a", 0.0, 0.0)).unwrap();
        shard.add_player(player("b", 0.0, 0.0)).unwrap();

        let err = shard.add_player(player("c", 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ShardError::AtCapacity { capacity: 2, .. }));
        assert_eq!(shard.player_count(), 2);
        assert!(!shard.contains_player(&"c".into()));
    }

    #[test]
    fn re_adding_a_present_player_replaces_the_record() {
        let mut shard = open_shard(1);
        shard.add_player(player("a", 0.0, 0.0)).unwrap();
        shard.add_player(player("a", 5.0, 5.0)).unwrap();

        assert_eq!(shard.player_count(), 1);
        assert_eq!(shard.player(&"a".into()).unwrap().position, Position::new(5.0, 5.0));
    }

    #[test]
    fn update_position_is_noop_for_unknown_player() {
        let mut shard = open_shard(4);
        assert!(!shard.update_player_position(&"ghost".into(), Position::new(1.0, 1.0), Timestamp(5)));

        shard.add_player(player("a", 0.0, 0.0)).unwrap();
        assert!(shard.update_player_position(&"a".into(), Position::new(1.0, 2.0), Timestamp(5)));
        let a = shard.player(&"a".into()).unwrap();
        assert_eq!(a.position, Position::new(1.0, 2.0));
        assert_eq!(a.last_update, Timestamp(5));
    }

    #[test]
    fn start_combat_requires_both_players() {
        let mut shard = open_shard(4);
        shard.add_player(player("a", 500.0, 500.0)).unwrap();

        let err = shard
            .start_combat(&"a".into(), &"b".into(), Timestamp(0))
            .unwrap_err();
        assert!(matches!(err, CombatError::UnknownParticipant { .. }));
        assert_eq!(shard.combat_count(), 0);
    }

    #[test]
    fn start_combat_rejects_defender_in_safe_zone() {
        let mut shard = zoned_shard();
        shard.add_player(player("a", 500.0, 500.0)).unwrap();
        shard.add_player(player("b", 100.0, 100.0)).unwrap();

        let err = shard
            .start_combat(&"a".into(), &"b".into(), Timestamp(0))
            .unwrap_err();
        assert!(matches!(err, CombatError::SafeZone { .. }));

        // Attacker position does not matter.
        let key = shard
            .start_combat(&"b".into(), &"a".into(), Timestamp(0))
            .unwrap();
        assert_eq!(key.as_str(), "b_a");
    }

    #[test]
    fn mutual_attacks_are_separate_sessions() {
        let mut shard = open_shard(4);
        shard.add_player(player("a", 0.0, 0.0)).unwrap();
        shard.add_player(player("b", 0.0, 0.0)).unwrap();

        shard.start_combat(&"a".into(), &"b".into(), Timestamp(0)).unwrap();
        shard.start_combat(&"b".into(), &"a".into(), Timestamp(0)).unwrap();
        assert_eq!(shard.combat_count(), 2);
    }

    #[test]
    fn removing_a_player_ends_their_combats() {
        let mut shard = open_shard(4);
        for id in ["a", "b", "c"] {
            shard.add_player(player(id, 0.0, 0.0)).unwrap();
        }
        shard.start_combat(&"a".into(), &"b".into(), Timestamp(0)).unwrap();
        shard.start_combat(&"c".into(), &"a".into(), Timestamp(0)).unwrap();
        shard.start_combat(&"b".into(), &"c".into(), Timestamp(0)).unwrap();

        assert!(shard.remove_player(&"a".into()).is_some());
        assert!(shard.remove_player(&"a".into()).is_none());
        let remaining: Vec<_> = shard.combats().map(CombatSession::key).collect();
        assert_eq!(remaining, vec![CombatKey("b_c".into())]);
    }

    #[test]
    fn stale_combats_are_collected_after_timeout() {
        let mut shard = open_shard(4);
        shard.add_player(player("a", 0.0, 0.0)).unwrap();
        shard.add_player(player("b", 0.0, 0.0)).unwrap();
        let key = shard.start_combat(&"a".into(), &"b".into(), Timestamp(1_000)).unwrap();

        let tick = shard.update(Timestamp(31_000), 100);
        assert!(tick.expired_combats.is_empty());
        assert!(shard.combat(&key).is_some());

        assert!(shard.record_hit(&key, Timestamp(20_000)));
        assert!(shard.update(Timestamp(50_000), 100).is_empty());

        let tick = shard.update(Timestamp(50_001), 100);
        assert_eq!(tick.expired_combats, vec![key.clone()]);
        assert!(shard.combat(&key).is_none());
    }

    #[test]
    fn depleted_objects_respawn_on_tick() {
        let mut shard = open_shard(1);
        let mut ore = WorldObject::new("ore", "resource", Position::new(3.0, 4.0));
        ore.deplete(Timestamp(100), 500);
        shard.upsert_object(ore);

        assert!(shard.update(Timestamp(599), 10).respawned_objects.is_empty());
        let tick = shard.update(Timestamp(600), 10);
        assert_eq!(tick.respawned_objects, vec![ObjectId::from("ore")]);

        let ore = shard.object(&"ore".into()).unwrap();
        assert!(ore.active);
        assert_eq!(ore.last_update, Timestamp(600));
    }

    #[test]
    fn update_runs_systems_after_combat_gc() {
        struct Recorder {
            npc_counts: Vec<usize>,
            resources_seen: usize,
        }

        impl ShardSystems for Recorder {
            fn tick_npcs(&mut self, _: &ShardId, npcs: &mut [NpcState], _: Timestamp, _: u64) {
                for npc in npcs.iter_mut() {
                    npc.position.x += 1.0;
                }
                self.npc_counts.push(npcs.len());
            }

            fn tick_resources(
                &mut self,
                _: &ShardId,
                objects: &mut BTreeMap<ObjectId, WorldObject>,
                _: Timestamp,
                _: u64,
            ) {
                self.resources_seen = objects.len();
            }
        }

        let mut shard = open_shard(1);
        shard.add_npc(NpcState::new("goblin", "goblin", Position::ORIGIN, 10));
        shard.upsert_object(WorldObject::new("tree", "resource", Position::ORIGIN));

        let mut recorder = Recorder {
            npc_counts: Vec::new(),
            resources_seen: 0,
        };
        shard.update_with(Timestamp(10), 10, &mut recorder);

        assert_eq!(recorder.npc_counts, vec![1]);
        assert_eq!(recorder.resources_seen, 1);
        assert_eq!(shard.npcs()[0].position.x, 1.0);
    }

    #[test]
    fn objects_updated_since_is_strict() {
        let mut shard = open_shard(1);
        shard.upsert_object(WorldObject::new("a", "chest", Position::ORIGIN).with_last_update(Timestamp(10)));
        shard.upsert_object(WorldObject::new("b", "chest", Position::ORIGIN).with_last_update(Timestamp(20)));

        let ids: Vec<_> = shard
            .objects_updated_since(Timestamp(10))
            .into_iter()
            .map(|object| object.id)
            .collect();
        assert_eq!(ids, vec![ObjectId::from("b")]);
    }

    #[test]
    fn snapshot_round_trip_preserves_state() {
        let mut shard = open_shard(4);
        shard.add_player(player("a", 0.0, 0.0)).unwrap();
        shard.add_player(player("b", 1.0, 1.0)).unwrap();
        shard.upsert_object(WorldObject::new("o", "chest", Position::new(2.0, 2.0)));
        shard.add_npc(NpcState::new("n", "wolf", Position::ORIGIN, 30));
        shard.start_combat(&"a".into(), &"b".into(), Timestamp(7)).unwrap();

        let bytes = shard.serialize().to_json().unwrap();
        let restored = Shard::deserialize(ShardSnapshot::from_json(&bytes).unwrap()).unwrap();

        assert_eq!(restored.serialize(), shard.serialize());
    }

    #[test]
    fn snapshot_uses_pair_encoding() {
        let mut shard = open_shard(4);
        shard.add_player(player("a", 0.0, 0.0)).unwrap();

        let value = serde_json::to_value(shard.serialize()).unwrap();
        assert_eq!(value["mapId"], "test");
        assert_eq!(value["players"][0][0], "a");
        assert_eq!(value["players"][0][1]["faction"], "blue");
        assert!(value["activeCombats"].as_array().unwrap().is_empty());
    }

    #[test]
    fn deserialize_rejects_over_capacity_and_drops_orphan_combats() {
        let mut shard = open_shard(4);
        shard.add_player(player("a", 0.0, 0.0)).unwrap();
        shard.add_player(player("b", 0.0, 0.0)).unwrap();
        shard.start_combat(&"a".into(), &"b".into(), Timestamp(0)).unwrap();

        let mut snapshot = shard.serialize();
        snapshot.config.capacity = 1;
        assert!(matches!(
            Shard::deserialize(snapshot),
            Err(SnapshotError::OverCapacity { players: 2, capacity: 1, .. })
        ));

        let mut snapshot = shard.serialize();
        snapshot.players.retain(|(id, _)| id.as_str() == "a");
        let restored = Shard::deserialize(snapshot).unwrap();
        assert_eq!(restored.combat_count(), 0);
    }
}
