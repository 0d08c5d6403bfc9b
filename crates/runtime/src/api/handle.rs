//! Cloneable façade for issuing commands to the world worker.
//!
//! [`WorldHandle`] hides channel plumbing and offers async helpers for
//! moving players, validating combat and querying world statistics.
use tokio::sync::{broadcast, mpsc, oneshot};

use game_core::{
    CombatKey, CombatSession, GlobalStats, MapChange, MapStats, Player, PlayerId, PlayerStats,
    Position, ShardId, Timestamp,
};

use super::errors::{Result, RuntimeError};
use super::events::{CheckpointReport, WorldEvent};
use crate::persistence::DeltaBundle;
use crate::workers::Command;

/// Client-facing handle to interact with the world runtime.
#[derive(Clone)]
pub struct WorldHandle {
    command_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<WorldEvent>,
}

impl WorldHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<Command>,
        event_tx: broadcast::Sender<WorldEvent>,
    ) -> Self {
        Self {
            command_tx,
            event_tx,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Moves `player` into `to`, leaving `from` (or their recorded shard).
    pub async fn change_map(
        &self,
        player: Player,
        from: Option<ShardId>,
        to: impl Into<ShardId>,
    ) -> Result<MapChange> {
        let to = to.into();
        self.request(|reply| Command::ChangeMap {
            player,
            from,
            to,
            reply,
        })
        .await?
    }

    /// Removes a player from the world (disconnect).
    pub async fn remove_player(&self, player: PlayerId) -> Result<Option<(ShardId, Player)>> {
        self.request(|reply| Command::RemovePlayer { player, reply })
            .await
    }

    pub async fn move_player(&self, player: PlayerId, position: Position) -> Result<bool> {
        self.request(|reply| Command::MovePlayer {
            player,
            position,
            reply,
        })
        .await
    }

    pub async fn update_stats(&self, player: PlayerId, stats: PlayerStats) -> Result<bool> {
        self.request(|reply| Command::UpdateStats {
            player,
            stats,
            reply,
        })
        .await
    }

    /// Starts combat. Rejections come back as [`RuntimeError::Combat`].
    pub async fn start_combat(&self, attacker: PlayerId, defender: PlayerId) -> Result<CombatKey> {
        self.request(|reply| Command::StartCombat {
            attacker,
            defender,
            reply,
        })
        .await?
    }

    pub async fn end_combat(
        &self,
        attacker: PlayerId,
        defender: PlayerId,
    ) -> Result<Option<CombatSession>> {
        self.request(|reply| Command::EndCombat {
            attacker,
            defender,
            reply,
        })
        .await
    }

    pub async fn record_hit(&self, attacker: PlayerId, defender: PlayerId) -> Result<bool> {
        self.request(|reply| Command::RecordHit {
            attacker,
            defender,
            reply,
        })
        .await
    }

    pub async fn players_in_map(&self, shard: impl Into<ShardId>) -> Result<Vec<Player>> {
        let shard = shard.into();
        self.request(|reply| Command::PlayersInMap { shard, reply })
            .await
    }

    pub async fn player_map(&self, player: PlayerId) -> Result<Option<ShardId>> {
        self.request(|reply| Command::PlayerMap { player, reply })
            .await
    }

    pub async fn spawn_position(&self, shard: impl Into<ShardId>) -> Result<Option<Position>> {
        let shard = shard.into();
        self.request(|reply| Command::SpawnPosition { shard, reply })
            .await
    }

    pub async fn map_stats(&self, shard: impl Into<ShardId>) -> Result<Option<MapStats>> {
        let shard = shard.into();
        self.request(|reply| Command::MapStats { shard, reply })
            .await
    }

    pub async fn global_stats(&self) -> Result<GlobalStats> {
        self.request(|reply| Command::GlobalStats { reply }).await
    }

    /// Objects changed strictly after `since`, grouped by shard.
    pub async fn delta_since(&self, since: Timestamp) -> Result<DeltaBundle> {
        self.request(|reply| Command::DeltaSince { since, reply })
            .await
    }

    pub async fn apply_delta(&self, bundle: DeltaBundle) -> Result<()> {
        self.request(|reply| Command::ApplyDelta { bundle, reply })
            .await?
    }

    /// Writes every shard to storage now.
    pub async fn checkpoint(&self) -> Result<CheckpointReport> {
        self.request(|reply| Command::Checkpoint { reply }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)
    }
}
