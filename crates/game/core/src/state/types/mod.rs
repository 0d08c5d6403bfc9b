//! Plain data records owned by shards.

mod common;
mod entities;
mod world;

pub use common::{NpcId, ObjectId, PlayerId, Position, ShardId};
pub use entities::{NpcState, Player, PlayerStats, WorldObject};
pub use world::SafeZone;
