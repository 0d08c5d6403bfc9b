//! Shard snapshot persistence with a write-through cache.
//!
//! [`PersistenceLayer`] keeps the latest known [`Shard`] per id in memory,
//! writes full snapshots to an injected [`KeyValueStore`] under
//! `shard:<id>`, and computes object deltas for incremental replication.
//!
//! Storage is eventual, not strict: a failed write leaves the cache
//! authoritative and is reported to the caller as a [`PersistenceError`].

mod delta;
mod error;

pub use delta::DeltaBundle;
pub use error::PersistenceError;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use game_core::{Clock, Shard, ShardId, ShardSnapshot, Timestamp, WorldConfig};

use crate::repository::KeyValueStore;

const KEY_PREFIX: &str = "shard:";

/// Storage key of a shard snapshot.
pub fn storage_key(shard: &ShardId) -> String {
    format!("{KEY_PREFIX}{shard}")
}

pub struct PersistenceLayer {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    world: WorldConfig,
    cache: BTreeMap<ShardId, Shard>,
    last_sync: BTreeMap<ShardId, Timestamp>,
}

impl PersistenceLayer {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, world: WorldConfig) -> Self {
        Self {
            store,
            clock,
            world,
            cache: BTreeMap::new(),
            last_sync: BTreeMap::new(),
        }
    }

    /// Cached shard, else the stored snapshot, else a fresh default shard.
    ///
    /// A snapshot that cannot be read or decoded is logged and replaced by
    /// a fresh shard.
    pub fn get_or_create_instance(&mut self, id: &ShardId) -> &mut Shard {
        match self.cache.entry(id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let shard = load_snapshot(self.store.as_ref(), id)
                    .unwrap_or_else(|| Shard::new(id.clone(), self.world.shard_config(id)));
                entry.insert(shard)
            }
        }
    }

    /// Replaces the cached shard without touching storage.
    pub fn cache_instance(&mut self, instance: Shard) {
        self.cache.insert(instance.id().clone(), instance);
    }

    /// Caches `instance` under `id` and writes its snapshot through to storage.
    pub fn save_instance(&mut self, id: &ShardId, instance: Shard) -> Result<(), PersistenceError> {
        let bytes = instance
            .serialize()
            .to_json()
            .map_err(|source| PersistenceError::Snapshot {
                shard: id.clone(),
                source,
            });
        self.cache.insert(id.clone(), instance);

        self.store
            .set(&storage_key(id), &bytes?)
            .map_err(|source| PersistenceError::Storage {
                shard: id.clone(),
                source,
            })?;
        self.last_sync.insert(id.clone(), self.clock.now());
        Ok(())
    }

    /// Writes every cached shard; returns the failures, if any.
    pub fn save_all(&mut self) -> Vec<PersistenceError> {
        let shards: Vec<Shard> = self.cache.values().cloned().collect();
        shards
            .into_iter()
            .filter_map(|shard| {
                let id = shard.id().clone();
                self.save_instance(&id, shard).err()
            })
            .collect()
    }

    /// Objects updated strictly after `since`, per cached shard.
    pub fn get_delta_changes(&self, since: Timestamp) -> DeltaBundle {
        let shards = self
            .cache
            .iter()
            .filter_map(|(id, shard)| {
                let objects = shard.objects_updated_since(since);
                (!objects.is_empty()).then(|| (id.clone(), objects))
            })
            .collect();
        DeltaBundle {
            shards,
            timestamp: self.clock.now(),
        }
    }

    /// Upserts delivered objects into their shards and persists each shard.
    ///
    /// Every shard in the bundle is updated in memory even if an earlier
    /// write failed; the first failure is returned.
    pub fn apply_delta_changes(&mut self, bundle: &DeltaBundle) -> Result<(), PersistenceError> {
        let mut first_error = None;
        for (id, objects) in &bundle.shards {
            let shard = self.get_or_create_instance(id);
            for object in objects {
                shard.upsert_object(object.clone());
            }
            let updated = shard.clone();
            if let Err(error) = self.save_instance(id, updated) {
                tracing::warn!(target: "runtime::persistence", shard = %id, %error, "delta write failed");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Drops the cache and every stored snapshot.
    pub fn clear_all(&mut self) -> Result<(), PersistenceError> {
        self.cache.clear();
        self.last_sync.clear();
        self.store.clear().map_err(PersistenceError::Clear)
    }

    pub fn cached(&self, id: &ShardId) -> Option<&Shard> {
        self.cache.get(id)
    }

    pub fn cached_ids(&self) -> impl Iterator<Item = &ShardId> {
        self.cache.keys()
    }

    /// When `id` was last written successfully.
    pub fn last_sync(&self, id: &ShardId) -> Option<Timestamp> {
        self.last_sync.get(id).copied()
    }

    /// Ids of every shard with a stored snapshot.
    pub fn stored_ids(&self) -> Vec<ShardId> {
        match self.store.keys(KEY_PREFIX) {
            Ok(keys) => keys
                .iter()
                .filter_map(|key| key.strip_prefix(KEY_PREFIX))
                .map(ShardId::from)
                .collect(),
            Err(error) => {
                tracing::warn!(target: "runtime::persistence", %error, "failed to list snapshots");
                Vec::new()
            }
        }
    }

    pub fn world(&self) -> &WorldConfig {
        &self.world
    }
}

fn load_snapshot(store: &dyn KeyValueStore, id: &ShardId) -> Option<Shard> {
    let bytes = match store.get(&storage_key(id)) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(error) => {
            tracing::warn!(target: "runtime::persistence", shard = %id, %error, "failed to read snapshot");
            return None;
        }
    };

    match ShardSnapshot::from_json(&bytes).and_then(Shard::deserialize) {
        Ok(shard) if shard.id() == id => {
            tracing::debug!(
                target: "runtime::persistence",
                shard = %id,
                players = shard.player_count(),
                "restored shard"
            );
            Some(shard)
        }
        Ok(shard) => {
            tracing::warn!(
                target: "runtime::persistence",
                shard = %id,
                found = %shard.id(),
                "snapshot stored under the wrong key; starting fresh"
            );
            None
        }
        Err(error) => {
            tracing::warn!(
                target: "runtime::persistence",
                shard = %id,
                %error,
                "corrupt snapshot; starting fresh"
            );
            None
        }
    }
}
