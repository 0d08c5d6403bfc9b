//! Hooks for per-tick simulation that lives outside the world core.

use std::collections::BTreeMap;

use crate::state::{NpcState, ObjectId, ShardId, WorldObject};
use crate::time::Timestamp;

/// Per-tick behavior plugged into [`super::Shard::update_with`].
///
/// NPC AI and resource generation are owned by content crates. Both methods
/// default to doing nothing.
pub trait ShardSystems {
    fn tick_npcs(
        &mut self,
        _shard: &ShardId,
        _npcs: &mut [NpcState],
        _now: Timestamp,
        _delta_ms: u64,
    ) {
    }

    fn tick_resources(
        &mut self,
        _shard: &ShardId,
        _objects: &mut BTreeMap<ObjectId, WorldObject>,
        _now: Timestamp,
        _delta_ms: u64,
    ) {
    }
}

/// Systems implementation that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSystems;

impl ShardSystems for NoopSystems {}
