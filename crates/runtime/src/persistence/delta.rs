use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use game_core::{ShardId, Timestamp, WorldObject};

/// Objects changed since a point in time, grouped by shard.
///
/// The unit of incremental replication: the receiver upserts each object by
/// id and remembers `timestamp` as the `since` of its next request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaBundle {
    pub shards: BTreeMap<ShardId, Vec<WorldObject>>,
    pub timestamp: Timestamp,
}

impl DeltaBundle {
    pub fn is_empty(&self) -> bool {
        self.shards.values().all(Vec::is_empty)
    }

    pub fn object_count(&self) -> usize {
        self.shards.values().map(Vec::len).sum()
    }
}
