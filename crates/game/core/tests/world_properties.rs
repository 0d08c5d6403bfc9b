//! Property-based tests for the shard and registry invariants.
//!
//! - Capacity: no sequence of joins ever pushes a shard past its capacity.
//! - Safe zones: combat never starts against a defender on or inside a zone.
//! - Stale combat: sessions survive exactly the timeout and no longer.
//! - Assignment: a player is registered in at most one shard.

use game_core::{
    CombatError, Player, PlayerId, Position, SafeZone, Shard, ShardConfig, ShardId, Timestamp,
    WorldConfig, WorldShardRegistry,
};
use proptest::prelude::*;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn player_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("p[0-9]{1,3}").unwrap()
}

fn shard_strategy() -> impl Strategy<Value = ShardId> {
    prop::sample::select(vec!["v1", "v2", "v3", "pvp"]).prop_map(ShardId::from)
}

fn zone_strategy() -> impl Strategy<Value = SafeZone> {
    (0.0f64..1_000.0, 0.0f64..1_000.0, 1.0f64..500.0, 1.0f64..500.0)
        .prop_map(|(x, y, w, h)| SafeZone::new(x, y, w, h))
}

// =============================================================================
// SHARD PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn capacity_is_never_exceeded(
        capacity in 0usize..8,
        joins in prop::collection::vec(player_id_strategy(), 0..40),
    ) {
        let mut shard = Shard::new("cap", ShardConfig::new(capacity));
        for id in joins {
            let _ = shard.add_player(Player::new(id.as_str(), "red", Position::ORIGIN));
            prop_assert!(shard.player_count() <= capacity);
        }
    }

    #[test]
    fn defender_inside_zone_is_never_attackable(
        zone in zone_strategy(),
        fx in 0.0f64..=1.0,
        fy in 0.0f64..=1.0,
        corner in 0u8..5,
    ) {
        // Interior points plus the exact corners of the rectangle.
        let position = match corner {
            0 => Position::new(zone.x, zone.y),
            1 => Position::new(zone.x + zone.width, zone.y),
            2 => Position::new(zone.x, zone.y + zone.height),
            3 => Position::new(zone.x + zone.width, zone.y + zone.height),
            _ => Position::new(zone.x + zone.width * fx, zone.y + zone.height * fy),
        };

        let mut shard = Shard::new("zoned", ShardConfig::new(4).with_safe_zone(zone));
        shard.add_player(Player::new("a", "red", Position::new(-10.0, -10.0))).unwrap();
        shard.add_player(Player::new("b", "blue", position)).unwrap();

        let result = shard.start_combat(&"a".into(), &"b".into(), Timestamp(0));
        prop_assert!(
            matches!(result, Err(CombatError::SafeZone { .. })),
            "unexpected result: {:?}",
            result
        );
        prop_assert_eq!(shard.combat_count(), 0);
    }

    #[test]
    fn combat_expires_only_after_timeout(
        last_hit in 0u64..1_000_000,
        elapsed in 0u64..60_000,
    ) {
        let mut shard = Shard::new("pvp", ShardConfig::new(2).contested());
        shard.add_player(Player::new("a", "red", Position::ORIGIN)).unwrap();
        shard.add_player(Player::new("b", "blue", Position::ORIGIN)).unwrap();
        let key = shard.start_combat(&"a".into(), &"b".into(), Timestamp(last_hit)).unwrap();

        let tick = shard.update(Timestamp(last_hit + elapsed), 100);
        let expired = elapsed > WorldConfig::COMBAT_TIMEOUT_MS;
        prop_assert_eq!(shard.combat(&key).is_none(), expired);
        prop_assert_eq!(tick.expired_combats.contains(&key), expired);
    }
}

// =============================================================================
// REGISTRY PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn players_are_in_at_most_one_shard(
        moves in prop::collection::vec((player_id_strategy(), shard_strategy(), any::<bool>()), 0..60),
    ) {
        let mut world = WorldShardRegistry::default();
        for (id, to, pass_source) in moves {
            let player_id = PlayerId::from(id.as_str());
            let from = if pass_source { world.player_map(&player_id).cloned() } else { None };
            let player = Player::new(player_id, "red", Position::ORIGIN);
            let _ = world.player_change_map(player, from.as_ref(), &to);
        }

        let stats = world.global_stats();
        let mut seen = std::collections::BTreeSet::new();
        for shard in world.shards() {
            for player in shard.players() {
                prop_assert!(seen.insert(player.id.clone()), "{} in two shards", player.id);
                prop_assert_eq!(world.player_map(&player.id), Some(shard.id()));
            }
        }
        prop_assert_eq!(seen.len(), stats.total_players);
    }
}

#[test]
fn scenario_join_then_change_map() {
    let mut world = WorldShardRegistry::default();
    let v1 = ShardId::from("v1");
    let v2 = ShardId::from("v2");

    world
        .player_change_map(Player::new("P", "red", Position::ORIGIN), None, &v1)
        .unwrap();
    let ids: Vec<_> = world.players_in_map(&v1).into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![PlayerId::from("P")]);
    assert!(world.players_in_map(&v2).is_empty());

    world
        .player_change_map(Player::new("P", "red", Position::ORIGIN), Some(&v1), &v2)
        .unwrap();
    assert!(world.players_in_map(&v1).is_empty());
    let ids: Vec<_> = world.players_in_map(&v2).into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![PlayerId::from("P")]);
}
