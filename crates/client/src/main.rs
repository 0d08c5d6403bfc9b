//! Shard client binary.
//!
//! Composition root that assembles:
//! 1. The local-authority world (`WorldRuntime`) with file-backed snapshots
//! 2. The client session (`SessionCoordinator`) over TCP
//! 3. A game loop mirroring authoritative player events into the world
//!
//! The session is single-task, so everything runs on the main task; only
//! the world worker and transport I/O are spawned.
//!
//! ```bash
//! SHARD_SERVER_ADDRESS=127.0.0.1:7777 PLAYER_ID=ada cargo run -p shard-client
//! OFFLINE_MODE=true cargo run -p shard-client
//! ```
mod config;
mod logging;
mod mirror;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use client_session::{
    ClientAction, ConnectionConfig, ConnectionEvent, SessionCoordinator, TcpConnector,
};
use game_core::{Player, PlayerId};
use runtime::{WorldRuntime, WorldRuntimeConfig};

use config::ClientConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // 1. Load configuration from environment
    let client_config = ClientConfig::from_env();
    let runtime_config = WorldRuntimeConfig::from_env();
    let connection_config = ConnectionConfig::from_env();

    // 2. Setup logging
    let _log_guard = logging::setup_logging(client_config.log_dir.as_deref())?;

    info!("Starting shard client");
    info!("Player: {} ({})", client_config.player_id, client_config.faction);
    info!("Persistence: {}", runtime_config.enable_persistence);
    info!("Server: {}", connection_config.address);

    // 3. Start the local world
    let runtime = WorldRuntime::builder().config(runtime_config).build()?;
    let world = runtime.handle();

    // 4. Build the session and wire the world mirror
    let mut session =
        SessionCoordinator::new(connection_config.clone(), Arc::new(TcpConnector));
    let local = PlayerId::from(client_config.player_id.as_str());
    let (mirror_tx, mut mirror_rx) = mpsc::unbounded_channel();
    mirror::install(session.event_bus(), local.clone(), mirror_tx);

    // 5. Place the local player
    let spawn = world
        .spawn_position(client_config.start_map.clone())
        .await?
        .with_context(|| format!("unknown start map {}", client_config.start_map))?;
    let player = Player::new(local.clone(), client_config.faction.clone(), spawn);
    let change = world
        .change_map(player, None, client_config.start_map.clone())
        .await?;
    info!("Placed {} in {}", local, change.to);

    session.update_player_state(json!({
        "id": local.as_str(),
        "faction": client_config.faction.as_str(),
        "map": change.to.as_str(),
        "x": spawn.x,
        "y": spawn.y,
    }))?;
    session.send_action(
        ClientAction::PlayerJoin,
        json!({ "id": local.as_str(), "map": change.to.as_str() }),
    )?;

    // 6. Go online, or stay local
    if client_config.offline {
        session.set_offline_mode()?;
    } else {
        session.connect(connection_config.address.clone())?;
    }

    // 7. Game loop
    let mut stats_timer = tokio::time::interval(client_config.stats_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(error) = signal {
                    warn!(%error, "failed to listen for ctrl-c");
                }
                break;
            }
            event = session.next_event() => {
                if let Some(event) = event {
                    log_connection_event(&event);
                }
            }
            Some(update) = mirror_rx.recv() => {
                mirror::apply(&world, update, &client_config.start_map).await?;
            }
            _ = stats_timer.tick() => {
                let stats = world.global_stats().await?;
                let status = session.get_connection_status();
                info!(
                    players = stats.total_players,
                    combats = stats.total_combats,
                    status = %status.status,
                    pending = status.pending_actions,
                    "world stats"
                );
            }
        }
    }

    // 8. Shutdown: close the session, then checkpoint the world
    info!("Shutting down");
    session.cleanup();
    drop(world);
    runtime.shutdown().await?;

    info!("Client shutdown complete");
    Ok(())
}

fn log_connection_event(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Connected { address } => info!("Connected to {address}"),
        ConnectionEvent::ConnectFailed { error, retry_in } => match retry_in {
            Some(delay) => warn!("Connect failed: {error}; retrying in {delay:?}"),
            None => warn!("Connect failed: {error}; playing offline"),
        },
        ConnectionEvent::Disconnected { reason, retry_in } => {
            warn!(reason = ?reason, retry_in = ?retry_in, "Disconnected")
        }
        ConnectionEvent::Reconnecting { attempt } => info!("Reconnecting (attempt {attempt})"),
        ConnectionEvent::Message { action, .. } => debug!(%action, "server message"),
    }
}
