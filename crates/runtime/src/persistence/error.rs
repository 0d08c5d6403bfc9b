use game_core::{ShardId, SnapshotError};

use crate::repository::RepositoryError;

/// Errors raised while writing shards through to storage.
///
/// None of these invalidate the in-memory world: callers log them and keep
/// running on the cached state.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage failure for shard {shard}: {source}")]
    Storage {
        shard: ShardId,
        #[source]
        source: RepositoryError,
    },

    #[error("snapshot encoding failed for shard {shard}: {source}")]
    Snapshot {
        shard: ShardId,
        #[source]
        source: SnapshotError,
    },

    #[error("failed to clear storage: {0}")]
    Clear(#[source] RepositoryError),
}

impl PersistenceError {
    pub fn shard(&self) -> Option<&ShardId> {
        match self {
            Self::Storage { shard, .. } | Self::Snapshot { shard, .. } => Some(shard),
            Self::Clear(_) => None,
        }
    }
}
