use crate::error::{ErrorSeverity, GameError};
use crate::state::{PlayerId, Position, ShardId};

/// Reasons a combat session could not be started.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CombatError {
    #[error("player {player} is not registered in shard {shard}")]
    UnknownParticipant { shard: ShardId, player: PlayerId },

    #[error("defender {defender} is inside a safe zone of shard {shard} at {position}")]
    SafeZone {
        shard: ShardId,
        defender: PlayerId,
        position: Position,
    },

    #[error("player {0} cannot attack themselves")]
    SelfTarget(PlayerId),

    #[error("player {0} is not assigned to any shard")]
    Unassigned(PlayerId),

    #[error("attacker {attacker} ({attacker_shard}) and defender {defender} ({defender_shard}) are in different shards")]
    DifferentShards {
        attacker: PlayerId,
        attacker_shard: ShardId,
        defender: PlayerId,
        defender_shard: ShardId,
    },
}

impl GameError for CombatError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SafeZone { .. } => ErrorSeverity::Recoverable,
            _ => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownParticipant { .. } => "COMBAT_UNKNOWN_PARTICIPANT",
            Self::SafeZone { .. } => "COMBAT_SAFE_ZONE",
            Self::SelfTarget(_) => "COMBAT_SELF_TARGET",
            Self::Unassigned(_) => "COMBAT_UNASSIGNED",
            Self::DifferentShards { .. } => "COMBAT_DIFFERENT_SHARDS",
        }
    }
}
