//! Mirrors authoritative player events into the local world.
//!
//! Bus handlers run synchronously on the session task, so they only decode
//! the payload and hand a [`MirrorUpdate`] to the main loop, which applies
//! it through the async [`WorldHandle`].

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use client_session::{EventBus, SyncEvent};
use game_core::{Player, PlayerId, Position, ShardId};
use runtime::WorldHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum MirrorUpdate {
    Joined { player: Player, map: Option<ShardId> },
    Left { player: PlayerId },
    Moved { player: PlayerId, position: Position },
    Attacked { attacker: PlayerId, defender: PlayerId },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemotePlayer {
    id: String,
    #[serde(default)]
    faction: Option<String>,
    #[serde(default)]
    map: Option<String>,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

#[derive(Deserialize)]
struct RemoteId {
    id: String,
}

#[derive(Deserialize)]
struct RemoteAttack {
    attacker: String,
    defender: String,
}

/// Registers the mirror handlers. Events about `local` are ignored; the
/// local player is placed by the game loop itself.
pub fn install(bus: &EventBus, local: PlayerId, tx: mpsc::UnboundedSender<MirrorUpdate>) {
    let handlers: [(SyncEvent, fn(&Value) -> anyhow::Result<MirrorUpdate>); 4] = [
        (SyncEvent::PlayerJoined, decode_joined),
        (SyncEvent::PlayerLeft, decode_left),
        (SyncEvent::PlayerMoved, decode_moved),
        (SyncEvent::PlayerAttacked, decode_attacked),
    ];

    for (event, decode) in handlers {
        let tx = tx.clone();
        let local = local.clone();
        bus.on(event, move |data| {
            let update = decode(data).with_context(|| format!("decoding {event:?}"))?;
            if update.concerns_only(&local) {
                return Ok(());
            }
            tx.send(update).context("world mirror channel closed")?;
            Ok(())
        });
    }
}

impl MirrorUpdate {
    fn concerns_only(&self, local: &PlayerId) -> bool {
        match self {
            Self::Joined { player, .. } => &player.id == local,
            Self::Left { player } | Self::Moved { player, .. } => player == local,
            Self::Attacked { .. } => false,
        }
    }
}

fn decode_joined(data: &Value) -> anyhow::Result<MirrorUpdate> {
    let remote: RemotePlayer = serde_json::from_value(data.clone())?;
    let faction = remote.faction.unwrap_or_else(|| "neutral".to_owned());
    Ok(MirrorUpdate::Joined {
        player: Player::new(remote.id, faction, Position::new(remote.x, remote.y)),
        map: remote.map.map(ShardId::from),
    })
}

fn decode_left(data: &Value) -> anyhow::Result<MirrorUpdate> {
    let remote: RemoteId = serde_json::from_value(data.clone())?;
    Ok(MirrorUpdate::Left {
        player: PlayerId::from(remote.id),
    })
}

fn decode_moved(data: &Value) -> anyhow::Result<MirrorUpdate> {
    let remote: RemotePlayer = serde_json::from_value(data.clone())?;
    Ok(MirrorUpdate::Moved {
        player: PlayerId::from(remote.id),
        position: Position::new(remote.x, remote.y),
    })
}

fn decode_attacked(data: &Value) -> anyhow::Result<MirrorUpdate> {
    let remote: RemoteAttack = serde_json::from_value(data.clone())?;
    Ok(MirrorUpdate::Attacked {
        attacker: PlayerId::from(remote.attacker),
        defender: PlayerId::from(remote.defender),
    })
}

/// Applies one update. Rejections are logged; only a dead world is an error.
pub async fn apply(
    world: &WorldHandle,
    update: MirrorUpdate,
    default_map: &ShardId,
) -> runtime::Result<()> {
    match update {
        MirrorUpdate::Joined { player, map } => {
            let id = player.id.clone();
            let map = map.unwrap_or_else(|| default_map.clone());
            match world.change_map(player, None, map).await {
                Ok(change) => debug!(target: "shards::mirror", player = %id, to = %change.to, "remote player placed"),
                Err(runtime::RuntimeError::Registry(error)) => {
                    warn!(target: "shards::mirror", player = %id, %error, "remote player not placed")
                }
                Err(error) => return Err(error),
            }
        }
        MirrorUpdate::Left { player } => {
            world.remove_player(player).await?;
        }
        MirrorUpdate::Moved { player, position } => {
            if !world.move_player(player.clone(), position).await? {
                debug!(target: "shards::mirror", %player, "move for unknown player");
            }
        }
        MirrorUpdate::Attacked { attacker, defender } => {
            match world.start_combat(attacker.clone(), defender.clone()).await {
                Ok(_) => {}
                Err(runtime::RuntimeError::Combat(error)) => {
                    debug!(target: "shards::mirror", %attacker, %defender, %error, "remote attack rejected")
                }
                Err(error) => return Err(error),
            }
        }
    }
    Ok(())
}
