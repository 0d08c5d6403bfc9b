use crate::error::{ErrorSeverity, GameError};
use crate::state::ShardId;

/// Errors raised by shard mutations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ShardError {
    #[error("shard {shard} is at capacity ({capacity})")]
    AtCapacity { shard: ShardId, capacity: usize },
}

impl GameError for ShardError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AtCapacity { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::AtCapacity { .. } => "SHARD_AT_CAPACITY",
        }
    }
}

/// Errors raised while restoring a shard from a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot of shard {shard} holds {players} players but capacity is {capacity}")]
    OverCapacity {
        shard: ShardId,
        players: usize,
        capacity: usize,
    },

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GameError for SnapshotError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Internal
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::OverCapacity { .. } => "SNAPSHOT_OVER_CAPACITY",
            Self::Json(_) => "SNAPSHOT_JSON",
        }
    }
}
