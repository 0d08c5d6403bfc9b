//! World model shared by the local-authority runtime and the client session.
//!
//! `game-core` owns the sharded world: players, world objects, NPC records
//! and combat sessions grouped into [`Shard`]s, and the
//! [`WorldShardRegistry`] that assigns each player to at most one shard.
//! Everything here is synchronous and performs no I/O; time flows in as a
//! [`Timestamp`] so behavior is reproducible.
pub mod combat;
pub mod config;
pub mod error;
pub mod registry;
pub mod shard;
pub mod state;
pub mod time;

pub use combat::{CombatError, CombatKey, CombatSession, session_key};
pub use config::{PlacementFailure, ShardConfig, WorldConfig};
pub use error::{ErrorSeverity, GameError};
pub use registry::{GlobalStats, MapChange, MapStats, RegistryError, WorldShardRegistry};
pub use shard::{
    NoopSystems, Shard, ShardError, ShardSnapshot, ShardSystems, ShardTick, SnapshotError,
};
pub use state::{
    NpcId, NpcState, ObjectId, Player, PlayerId, PlayerStats, Position, SafeZone, ShardId,
    WorldObject,
};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
