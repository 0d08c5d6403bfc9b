//! World worker that owns the authoritative [`WorldShardRegistry`].
//!
//! Receives commands from [`crate::WorldHandle`], advances every shard on a
//! fixed interval, checkpoints through the [`PersistenceLayer`], and
//! publishes [`WorldEvent`] notifications.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use game_core::{
    Clock, CombatKey, CombatSession, GlobalStats, MapChange, MapStats, Player, PlayerId,
    PlayerStats, Position, RegistryError, ShardId, Timestamp, WorldShardRegistry,
};

use crate::api::{CheckpointReport, Result, WorldEvent};
use crate::persistence::{DeltaBundle, PersistenceLayer};

/// Commands that can be sent to the world worker.
pub enum Command {
    ChangeMap {
        player: Player,
        from: Option<ShardId>,
        to: ShardId,
        reply: oneshot::Sender<Result<MapChange>>,
    },
    RemovePlayer {
        player: PlayerId,
        reply: oneshot::Sender<Option<(ShardId, Player)>>,
    },
    MovePlayer {
        player: PlayerId,
        position: Position,
        reply: oneshot::Sender<bool>,
    },
    UpdateStats {
        player: PlayerId,
        stats: PlayerStats,
        reply: oneshot::Sender<bool>,
    },
    StartCombat {
        attacker: PlayerId,
        defender: PlayerId,
        reply: oneshot::Sender<Result<CombatKey>>,
    },
    EndCombat {
        attacker: PlayerId,
        defender: PlayerId,
        reply: oneshot::Sender<Option<CombatSession>>,
    },
    RecordHit {
        attacker: PlayerId,
        defender: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    PlayersInMap {
        shard: ShardId,
        reply: oneshot::Sender<Vec<Player>>,
    },
    PlayerMap {
        player: PlayerId,
        reply: oneshot::Sender<Option<ShardId>>,
    },
    SpawnPosition {
        shard: ShardId,
        reply: oneshot::Sender<Option<Position>>,
    },
    MapStats {
        shard: ShardId,
        reply: oneshot::Sender<Option<MapStats>>,
    },
    GlobalStats {
        reply: oneshot::Sender<GlobalStats>,
    },
    DeltaSince {
        since: Timestamp,
        reply: oneshot::Sender<DeltaBundle>,
    },
    ApplyDelta {
        bundle: DeltaBundle,
        reply: oneshot::Sender<Result<()>>,
    },
    Checkpoint {
        reply: oneshot::Sender<CheckpointReport>,
    },
    /// Stop the loop after a final checkpoint.
    Shutdown,
}

/// Background task that processes world commands and ticks.
pub struct WorldWorker {
    registry: WorldShardRegistry,
    persistence: PersistenceLayer,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    checkpoint_every_ticks: u64,
    ticks: u64,
    last_tick: Timestamp,
    command_rx: mpsc::Receiver<Command>,
    event_tx: broadcast::Sender<WorldEvent>,
}

impl WorldWorker {
    /// Restores every configured shard through `persistence` and builds the
    /// registry from them.
    pub fn new(
        mut persistence: PersistenceLayer,
        clock: Arc<dyn Clock>,
        tick_interval: Duration,
        checkpoint_every_ticks: u64,
        command_rx: mpsc::Receiver<Command>,
        event_tx: broadcast::Sender<WorldEvent>,
    ) -> Self {
        let world = persistence.world().clone();
        let restored: Vec<_> = world
            .shards
            .keys()
            .map(|id| persistence.get_or_create_instance(id).clone())
            .collect();
        for id in persistence.stored_ids() {
            if !world.shards.contains_key(&id) {
                debug!(target: "runtime::worker", shard = %id, "ignoring stored shard missing from config");
            }
        }
        let registry = WorldShardRegistry::from_shards(world, restored);
        let last_tick = clock.now();

        Self {
            registry,
            persistence,
            clock,
            tick_interval,
            checkpoint_every_ticks,
            ticks: 0,
            last_tick,
            command_rx,
            event_tx,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                _ = ticker.tick() => self.tick(),
            }
        }

        let report = self.checkpoint();
        info!(
            target: "runtime::worker",
            saved = report.saved,
            failed = report.failed,
            "world worker stopped"
        );
    }

    fn publish(&self, event: WorldEvent) {
        let _ = self.event_tx.send(event);
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::ChangeMap {
                player,
                from,
                to,
                reply,
            } => {
                let result = self.change_map(player, from, to);
                let _ = reply.send(result);
            }
            Command::RemovePlayer { player, reply } => {
                let removed = self.registry.remove_player(&player);
                if let Some((shard, _)) = &removed {
                    self.publish(WorldEvent::PlayerLeft {
                        player,
                        shard: shard.clone(),
                    });
                }
                let _ = reply.send(removed);
            }
            Command::MovePlayer {
                player,
                position,
                reply,
            } => {
                let moved =
                    self.registry
                        .update_player_position(&player, position, self.clock.now());
                if moved {
                    self.publish(WorldEvent::PlayerMoved { player, position });
                }
                let _ = reply.send(moved);
            }
            Command::UpdateStats {
                player,
                stats,
                reply,
            } => {
                let updated = self
                    .registry
                    .update_player_stats(&player, stats, self.clock.now());
                let _ = reply.send(updated);
            }
            Command::StartCombat {
                attacker,
                defender,
                reply,
            } => {
                let result = self
                    .registry
                    .start_combat(&attacker, &defender, self.clock.now());
                match &result {
                    Ok(key) => self.publish(WorldEvent::CombatStarted {
                        key: key.clone(),
                        attacker,
                        defender,
                    }),
                    Err(error) => debug!(
                        target: "runtime::worker",
                        %attacker,
                        %defender,
                        %error,
                        "combat rejected"
                    ),
                }
                let _ = reply.send(result.map_err(Into::into));
            }
            Command::EndCombat {
                attacker,
                defender,
                reply,
            } => {
                let ended = self.registry.end_combat(&attacker, &defender);
                if let Some(session) = &ended {
                    self.publish(WorldEvent::CombatEnded { key: session.key() });
                }
                let _ = reply.send(ended);
            }
            Command::RecordHit {
                attacker,
                defender,
                reply,
            } => {
                let recorded = self
                    .registry
                    .record_hit(&attacker, &defender, self.clock.now());
                let _ = reply.send(recorded);
            }
            Command::PlayersInMap { shard, reply } => {
                let _ = reply.send(self.registry.players_in_map(&shard));
            }
            Command::PlayerMap { player, reply } => {
                let _ = reply.send(self.registry.player_map(&player).cloned());
            }
            Command::SpawnPosition { shard, reply } => {
                let _ = reply.send(self.registry.spawn_position(&shard));
            }
            Command::MapStats { shard, reply } => {
                let _ = reply.send(self.registry.map_stats(&shard));
            }
            Command::GlobalStats { reply } => {
                let _ = reply.send(self.registry.global_stats());
            }
            Command::DeltaSince { since, reply } => {
                self.refresh_cache();
                let _ = reply.send(self.persistence.get_delta_changes(since));
            }
            Command::ApplyDelta { bundle, reply } => {
                let result = self.apply_delta(&bundle);
                let _ = reply.send(result);
            }
            Command::Checkpoint { reply } => {
                let _ = reply.send(self.checkpoint());
            }
            Command::Shutdown => {}
        }
    }

    fn change_map(&mut self, player: Player, from: Option<ShardId>, to: ShardId) -> Result<MapChange> {
        let id = player.id.clone();
        match self.registry.player_change_map(player, from.as_ref(), &to) {
            Ok(change) => {
                if let Some(previous) = &change.from
                    && previous != &change.to
                {
                    self.publish(WorldEvent::PlayerLeft {
                        player: id.clone(),
                        shard: previous.clone(),
                    });
                }
                self.publish(WorldEvent::PlayerJoined {
                    player: id,
                    shard: change.to.clone(),
                    from: change.from.clone(),
                });
                Ok(change)
            }
            Err(error) => {
                if let RegistryError::PlacementRejected {
                    target,
                    restored_to,
                    ..
                } = &error
                {
                    self.publish(WorldEvent::PlacementRejected {
                        player: id,
                        target: target.clone(),
                        restored_to: restored_to.clone(),
                    });
                }
                Err(error.into())
            }
        }
    }

    fn tick(&mut self) {
        let now = self.clock.now();
        let delta_ms = now.millis_since(self.last_tick);
        self.last_tick = now;

        for (shard, tick) in self.registry.update_all(now, delta_ms) {
            for key in tick.expired_combats {
                self.publish(WorldEvent::CombatExpired {
                    shard: shard.clone(),
                    key,
                });
            }
            if !tick.respawned_objects.is_empty() {
                self.publish(WorldEvent::ObjectsRespawned {
                    shard,
                    objects: tick.respawned_objects,
                });
            }
        }

        self.ticks += 1;
        if self.checkpoint_every_ticks > 0 && self.ticks % self.checkpoint_every_ticks == 0 {
            self.checkpoint();
        }
    }

    /// Copies the live registry shards into the persistence cache.
    fn refresh_cache(&mut self) {
        for shard in self.registry.shards() {
            self.persistence.cache_instance(shard.clone());
        }
    }

    fn checkpoint(&mut self) -> CheckpointReport {
        let shards: Vec<_> = self.registry.shards().cloned().collect();
        let mut report = CheckpointReport {
            at: self.clock.now(),
            ..CheckpointReport::default()
        };

        for shard in shards {
            let id = shard.id().clone();
            match self.persistence.save_instance(&id, shard) {
                Ok(()) => report.saved += 1,
                Err(error) => {
                    report.failed += 1;
                    warn!(target: "runtime::worker", shard = %id, %error, "checkpoint write failed");
                }
            }
        }

        debug!(
            target: "runtime::worker",
            saved = report.saved,
            failed = report.failed,
            "checkpoint"
        );
        self.publish(WorldEvent::Checkpoint(report.clone()));
        report
    }

    fn apply_delta(&mut self, bundle: &DeltaBundle) -> Result<()> {
        self.refresh_cache();
        let result = self.persistence.apply_delta_changes(bundle);

        for (id, objects) in &bundle.shards {
            match self.registry.shard_mut(id) {
                Some(shard) => {
                    for object in objects {
                        shard.upsert_object(object.clone());
                    }
                }
                None => warn!(target: "runtime::worker", shard = %id, "delta for unknown shard"),
            }
        }

        result.map_err(Into::into)
    }
}
