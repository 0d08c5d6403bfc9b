//! Notifications published by the world worker.

use game_core::{CombatKey, ObjectId, PlayerId, Position, ShardId, Timestamp};

#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    PlayerJoined {
        player: PlayerId,
        shard: ShardId,
        from: Option<ShardId>,
    },
    PlayerLeft {
        player: PlayerId,
        shard: ShardId,
    },
    PlayerMoved {
        player: PlayerId,
        position: Position,
    },
    PlacementRejected {
        player: PlayerId,
        target: ShardId,
        restored_to: Option<ShardId>,
    },
    CombatStarted {
        key: CombatKey,
        attacker: PlayerId,
        defender: PlayerId,
    },
    CombatEnded {
        key: CombatKey,
    },
    /// Dropped by the inactivity timeout.
    CombatExpired {
        shard: ShardId,
        key: CombatKey,
    },
    ObjectsRespawned {
        shard: ShardId,
        objects: Vec<ObjectId>,
    },
    Checkpoint(CheckpointReport),
}

/// Result of writing every shard to storage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckpointReport {
    pub saved: usize,
    pub failed: usize,
    pub at: Timestamp,
}

impl CheckpointReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
