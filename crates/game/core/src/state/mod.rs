//! World data model.
//!
//! Records here carry no behavior beyond small helpers; invariants are
//! enforced by [`crate::shard::Shard`] and [`crate::registry::WorldShardRegistry`].

pub mod types;

pub use types::{
    NpcId, NpcState, ObjectId, Player, PlayerId, PlayerStats, Position, SafeZone, ShardId,
    WorldObject,
};
