//! PersistenceLayer behavior against in-memory, failing and file stores.

use std::sync::Arc;

use game_core::{
    ManualClock, Player, Position, Shard, ShardConfig, ShardId, Timestamp, WorldConfig,
    WorldObject,
};
use runtime::{
    DeltaBundle, FileStore, InMemoryStore, KeyValueStore, PersistenceError, PersistenceLayer,
    RepositoryError, storage_key,
};

// ================================================================
// Helpers
// ================================================================

/// Store whose writes always fail; reads see nothing.
struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> runtime::repository::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &[u8]) -> runtime::repository::Result<()> {
        Err(RepositoryError::LockPoisoned)
    }

    fn delete(&self, _key: &str) -> runtime::repository::Result<()> {
        Ok(())
    }

    fn keys(&self, _prefix: &str) -> runtime::repository::Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn clear(&self) -> runtime::repository::Result<()> {
        Err(RepositoryError::LockPoisoned)
    }
}

fn sid(id: &str) -> ShardId {
    ShardId::from(id)
}

fn layer(store: Arc<dyn KeyValueStore>, clock: &ManualClock) -> PersistenceLayer {
    PersistenceLayer::new(store, Arc::new(clock.clone()), WorldConfig::default())
}

// ================================================================
// Load / create / save
// ================================================================

#[test]
fn missing_shard_is_created_from_world_defaults() {
    let clock = ManualClock::new(Timestamp(0));
    let mut persistence = layer(Arc::new(InMemoryStore::new()), &clock);

    let shard = persistence.get_or_create_instance(&sid("pvp"));
    assert_eq!(shard.capacity(), WorldConfig::CONTESTED_CAPACITY);
    assert!(shard.config().safe_zones.is_empty());

    let unknown = persistence.get_or_create_instance(&sid("elsewhere"));
    assert_eq!(unknown.config(), &ShardConfig::default());
}

#[test]
fn saved_instance_is_restored_by_a_new_layer() {
    let clock = ManualClock::new(Timestamp(1_000));
    let store = Arc::new(InMemoryStore::new());
    let mut persistence = layer(store.clone(), &clock);

    let mut shard = persistence.get_or_create_instance(&sid("v1")).clone();
    shard
        .add_player(Player::new("p1", "red", Position::new(1.0, 2.0)))
        .unwrap();
    persistence.save_instance(&sid("v1"), shard).unwrap();

    assert_eq!(persistence.last_sync(&sid("v1")), Some(Timestamp(1_000)));
    assert!(store.exists(&storage_key(&sid("v1"))));
    assert_eq!(persistence.stored_ids(), vec![sid("v1")]);

    let mut reopened = layer(store, &clock);
    let restored = reopened.get_or_create_instance(&sid("v1"));
    assert!(restored.contains_player(&"p1".into()));
    assert_eq!(reopened.last_sync(&sid("v1")), None);
}

#[test]
fn cache_wins_over_storage() {
    let clock = ManualClock::new(Timestamp(0));
    let store = Arc::new(InMemoryStore::new());
    let mut persistence = layer(store.clone(), &clock);

    persistence
        .get_or_create_instance(&sid("v2"))
        .add_player(Player::new("cached", "red", Position::ORIGIN))
        .unwrap();

    // Storage never saw the player, yet the cached instance keeps it.
    assert!(!store.exists(&storage_key(&sid("v2"))));
    assert!(
        persistence
            .get_or_create_instance(&sid("v2"))
            .contains_player(&"cached".into())
    );
}

#[test]
fn corrupt_snapshot_is_replaced_by_fresh_shard() {
    let clock = ManualClock::new(Timestamp(0));
    let store = Arc::new(InMemoryStore::new());
    store.set(&storage_key(&sid("v1")), b"{not json").unwrap();
    let mut persistence = layer(store, &clock);

    let shard = persistence.get_or_create_instance(&sid("v1"));
    assert_eq!(shard.player_count(), 0);
    assert_eq!(shard.id(), &sid("v1"));
}

#[test]
fn failed_write_keeps_cache_authoritative() {
    let clock = ManualClock::new(Timestamp(0));
    let mut persistence = layer(Arc::new(FailingStore), &clock);

    let mut shard = Shard::new("v1", ShardConfig::new(4));
    shard
        .add_player(Player::new("p", "red", Position::ORIGIN))
        .unwrap();

    let err = persistence.save_instance(&sid("v1"), shard).unwrap_err();
    assert!(matches!(err, PersistenceError::Storage { .. }));
    assert_eq!(err.shard(), Some(&sid("v1")));
    assert!(persistence.cached(&sid("v1")).unwrap().contains_player(&"p".into()));
    assert_eq!(persistence.last_sync(&sid("v1")), None);

    assert!(matches!(persistence.clear_all(), Err(PersistenceError::Clear(_))));
    assert!(persistence.cached(&sid("v1")).is_none());
}

// ================================================================
// Delta replication
// ================================================================

#[test]
fn delta_contains_only_objects_updated_after_since() {
    let clock = ManualClock::new(Timestamp(500));
    let mut persistence = layer(Arc::new(InMemoryStore::new()), &clock);

    let v1 = persistence.get_or_create_instance(&sid("v1"));
    v1.upsert_object(WorldObject::new("old", "chest", Position::ORIGIN).with_last_update(Timestamp(100)));
    v1.upsert_object(WorldObject::new("new", "chest", Position::ORIGIN).with_last_update(Timestamp(300)));
    persistence.get_or_create_instance(&sid("v2"));

    let delta = persistence.get_delta_changes(Timestamp(100));
    assert_eq!(delta.timestamp, Timestamp(500));
    assert_eq!(delta.shards.len(), 1);
    let ids: Vec<_> = delta.shards[&sid("v1")].iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["new"]);

    assert!(persistence.get_delta_changes(Timestamp(300)).is_empty());
}

#[test]
fn applied_delta_is_upserted_and_persisted() {
    let clock = ManualClock::new(Timestamp(0));
    let store = Arc::new(InMemoryStore::new());
    let mut persistence = layer(store.clone(), &clock);

    let mut bundle = DeltaBundle {
        timestamp: Timestamp(42),
        ..DeltaBundle::default()
    };
    bundle.shards.insert(
        sid("v3"),
        vec![
            WorldObject::new("ore", "resource", Position::new(1.0, 1.0)),
            WorldObject::new("gem", "resource", Position::new(2.0, 2.0)),
        ],
    );
    persistence.apply_delta_changes(&bundle).unwrap();

    // Upsert by id replaces rather than duplicates.
    let mut moved = WorldObject::new("ore", "resource", Position::new(9.0, 9.0));
    moved.active = false;
    bundle.shards.insert(sid("v3"), vec![moved]);
    persistence.apply_delta_changes(&bundle).unwrap();

    let mut reopened = layer(store, &clock);
    let shard = reopened.get_or_create_instance(&sid("v3"));
    assert_eq!(shard.objects().count(), 2);
    let ore = shard.object(&"ore".into()).unwrap();
    assert_eq!(ore.position, Position::new(9.0, 9.0));
    assert!(!ore.active);
}

#[test]
fn clear_all_drops_cache_and_storage() {
    let clock = ManualClock::new(Timestamp(0));
    let store = Arc::new(InMemoryStore::new());
    let mut persistence = layer(store.clone(), &clock);

    let shard = persistence.get_or_create_instance(&sid("v1")).clone();
    persistence.save_instance(&sid("v1"), shard).unwrap();
    assert!(!store.is_empty());

    persistence.clear_all().unwrap();
    assert!(store.is_empty());
    assert_eq!(persistence.cached_ids().count(), 0);
    assert_eq!(persistence.last_sync(&sid("v1")), None);
}

// ================================================================
// File store
// ================================================================

#[test]
fn file_store_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("world")).unwrap();

    store.set("shard:v1", br#"{"a":1}"#).unwrap();
    store.set("shard:v2", b"{}").unwrap();
    store.set("meta", b"{}").unwrap();

    assert_eq!(store.get("shard:v1").unwrap().as_deref(), Some(&br#"{"a":1}"#[..]));
    assert_eq!(store.get("shard:missing").unwrap(), None);
    assert_eq!(store.keys("shard:").unwrap(), vec!["shard:v1", "shard:v2"]);

    let leftovers = std::fs::read_dir(store.base_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);

    store.delete("shard:v1").unwrap();
    store.delete("shard:v1").unwrap();
    assert_eq!(store.keys("").unwrap(), vec!["meta", "shard:v2"]);

    store.clear().unwrap();
    assert!(store.keys("").unwrap().is_empty());
}

#[test]
fn persistence_survives_restart_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(Timestamp(7));

    {
        let store = Arc::new(FileStore::new(dir.path()).unwrap());
        let mut persistence = layer(store, &clock);
        let mut shard = persistence.get_or_create_instance(&sid("pvp")).clone();
        shard
            .add_player(Player::new("a", "red", Position::ORIGIN))
            .unwrap();
        shard
            .add_player(Player::new("b", "blue", Position::ORIGIN))
            .unwrap();
        shard.start_combat(&"a".into(), &"b".into(), Timestamp(7)).unwrap();
        persistence.save_instance(&sid("pvp"), shard).unwrap();
    }

    let store = Arc::new(FileStore::new(dir.path()).unwrap());
    let mut persistence = layer(store, &clock);
    let shard = persistence.get_or_create_instance(&sid("pvp"));
    assert_eq!(shard.player_count(), 2);
    assert_eq!(shard.combat_count(), 1);
}
