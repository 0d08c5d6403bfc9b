use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

use super::{NpcId, ObjectId, PlayerId, Position};

/// Hit points and shield of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub hp: u32,
    pub shield: u32,
    pub max_hp: u32,
    pub max_shield: u32,
}

impl PlayerStats {
    pub const fn new(max_hp: u32, max_shield: u32) -> Self {
        Self {
            hp: max_hp,
            shield: max_shield,
            max_hp,
            max_shield,
        }
    }

    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self::new(100, 50)
    }
}

/// A player registered in exactly one shard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub position: Position,
    pub faction: String,
    pub stats: PlayerStats,
    pub last_update: Timestamp,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, faction: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
            faction: faction.into(),
            stats: PlayerStats::default(),
            last_update: Timestamp::ZERO,
        }
    }

    #[must_use]
    pub fn with_stats(mut self, stats: PlayerStats) -> Self {
        self.stats = stats;
        self
    }

    #[must_use]
    pub fn with_last_update(mut self, last_update: Timestamp) -> Self {
        self.last_update = last_update;
        self
    }
}

/// An object placed in a shard (resource node, loot, portal marker...).
///
/// Objects are produced by content generators outside this crate; the shard
/// only stores them and tracks `last_update` for delta replication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldObject {
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Position,
    pub active: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    pub last_update: Timestamp,
    /// When an inactive object becomes active again. `None` means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respawn_at: Option<Timestamp>,
}

impl WorldObject {
    pub fn new(id: impl Into<ObjectId>, kind: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            position,
            active: true,
            data: serde_json::Value::Null,
            last_update: Timestamp::ZERO,
            respawn_at: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_last_update(mut self, last_update: Timestamp) -> Self {
        self.last_update = last_update;
        self
    }

    /// Marks the object as consumed until `respawn_at`.
    pub fn deplete(&mut self, now: Timestamp, respawn_after_ms: u64) {
        self.active = false;
        self.respawn_at = Some(now.saturating_add(respawn_after_ms));
        self.last_update = now;
    }
}

/// Minimal NPC record stored with the shard.
///
/// Behavior lives outside this crate and is plugged in through
/// [`crate::shard::ShardSystems`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcState {
    pub id: NpcId,
    pub template: String,
    pub position: Position,
    pub hp: u32,
    pub active: bool,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl NpcState {
    pub fn new(
        id: impl Into<NpcId>,
        template: impl Into<String>,
        position: Position,
        hp: u32,
    ) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            position,
            hp,
            active: true,
            data: serde_json::Value::Null,
        }
    }
}
