//! Portable full-state snapshot of a shard.
//!
//! Associative data is stored as ordered `[key, value]` pairs:
//!
//! ```text
//! { "mapId": "v1",
//!   "players": [["p1", {...}], ...],
//!   "objects": [["o1", {...}], ...],
//!   "npcs": [{...}, ...],
//!   "activeCombats": [["p1_p2", {...}], ...],
//!   "config": {...} }
//! ```

use serde::{Deserialize, Serialize};

use crate::combat::{CombatKey, CombatSession};
use crate::config::ShardConfig;
use crate::state::{NpcState, ObjectId, Player, PlayerId, ShardId, WorldObject};

use super::SnapshotError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardSnapshot {
    pub map_id: ShardId,
    pub players: Vec<(PlayerId, Player)>,
    pub objects: Vec<(ObjectId, WorldObject)>,
    #[serde(default)]
    pub npcs: Vec<NpcState>,
    #[serde(default)]
    pub active_combats: Vec<(CombatKey, CombatSession)>,
    pub config: ShardConfig,
}

impl ShardSnapshot {
    pub fn to_json(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
