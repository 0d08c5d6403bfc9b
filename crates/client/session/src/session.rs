//! Facade over the event bus, replicated state and connection manager.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use strum::IntoEnumIterator;
use tracing::{debug, info};

use game_core::Clock;

use crate::connection::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState,
};
use crate::events::{EventBus, NetworkEvent, SyncEvent};
use crate::protocol::ClientAction;
use crate::state::{ReplicatedState, StateError};
use crate::transport::Connector;

pub const STATUS_PATH: &str = "connectionStatus";
pub const PLAYER_PATH: &str = "player";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("session has been cleaned up")]
    CleanedUp,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionMode {
    Online,
    Offline,
}

/// Coarse status merged with the connection's live counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// `online`, `offline` or `error`.
    pub status: String,
    pub mode: SessionMode,
    pub connected: bool,
    pub pending_actions: usize,
    pub dropped_actions: u64,
    pub reconnect_attempts: u32,
}

type Outbox = Rc<RefCell<VecDeque<(ClientAction, Value)>>>;

/// Single entry point for the game and UI layers.
///
/// Outbound intents published on the bus as
/// [`NetworkEvent::Outbound`] are collected into an outbox and handed to the
/// connection manager at the end of every facade call, so bus handlers
/// never re-enter the manager.
pub struct SessionCoordinator {
    bus: EventBus,
    state: ReplicatedState,
    connection: ConnectionManager,
    outbox: Outbox,
    mode: SessionMode,
    cleaned_up: bool,
}

impl SessionCoordinator {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let bus = EventBus::new();
        let state = ReplicatedState::new(bus.clone());
        let connection = ConnectionManager::new(config, connector, bus.clone());

        let coordinator = Self {
            bus,
            state,
            connection,
            outbox: Rc::default(),
            mode: SessionMode::Offline,
            cleaned_up: false,
        };
        coordinator.wire();
        coordinator
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.connection.set_clock(clock);
        self
    }

    fn wire(&self) {
        for (event, status) in [
            (NetworkEvent::Connected, "online"),
            (NetworkEvent::Disconnected, "offline"),
            (NetworkEvent::Error, "error"),
        ] {
            let state = self.state.clone();
            self.bus.on(event, move |_| {
                state.update_state(STATUS_PATH, json!(status))?;
                Ok(())
            });
        }

        let state = self.state.clone();
        self.bus.on(SyncEvent::StateSync, move |data| {
            state.sync_state(data.clone())?;
            Ok(())
        });

        for action in ClientAction::iter() {
            let outbox = self.outbox.clone();
            self.bus.on(NetworkEvent::Outbound(action), move |data| {
                outbox.borrow_mut().push_back((action, data.clone()));
                Ok(())
            });
        }
    }

    // ========================================================================
    // Connection control
    // ========================================================================

    pub fn connect(&mut self, address: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.mode = SessionMode::Online;
        self.connection.connect(address);
        self.flush_outbox();
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Disconnects and pins the coarse status to `offline`.
    pub fn set_offline_mode(&mut self) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.mode = SessionMode::Offline;
        self.connection.disconnect();
        self.state.update_state(STATUS_PATH, json!("offline"))?;
        info!(target: "session", "offline mode");
        Ok(())
    }

    pub fn get_connection_status(&self) -> ConnectionStatus {
        let status = self
            .state
            .get(STATUS_PATH)
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_else(|| "offline".to_owned());

        ConnectionStatus {
            status,
            mode: self.mode,
            connected: self.connection.state() == ConnectionState::Connected,
            pending_actions: self.connection.pending_actions(),
            dropped_actions: self.connection.dropped_actions(),
            reconnect_attempts: self.connection.reconnect_attempts(),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Deep-merges `partial` into the `player` subtree and sends it as
    /// `player:update`.
    pub fn update_player_state(&mut self, partial: Value) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.state.merge_state(PLAYER_PATH, partial.clone())?;
        self.send_action(ClientAction::PlayerUpdate, partial)
    }

    /// Publishes an outbound intent and hands it to the connection.
    pub fn send_action(&mut self, action: ClientAction, data: Value) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.bus.emit(NetworkEvent::Outbound(action), &data);
        self.flush_outbox();
        Ok(())
    }

    fn flush_outbox(&mut self) {
        loop {
            let next = self.outbox.borrow_mut().pop_front();
            let Some((action, data)) = next else {
                break;
            };
            let delivery = self.connection.send_action(action, data);
            debug!(target: "session", %action, ?delivery, "outbound action");
        }
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Processes every ready connection report.
    pub fn poll(&mut self) -> Vec<ConnectionEvent> {
        self.flush_outbox();
        let events = self.connection.poll();
        self.flush_outbox();
        events
    }

    /// Waits for the next connection event. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.flush_outbox();
        let event = self.connection.next_event().await;
        self.flush_outbox();
        event
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn replicated_state(&self) -> &ReplicatedState {
        &self.state
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_manager_mut(&mut self) -> &mut ConnectionManager {
        &mut self.connection
    }

    /// Disconnects, drops every bus registration and subscription, and
    /// resets the state tree. Repeated calls do nothing.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        self.mode = SessionMode::Offline;

        self.connection.disconnect();
        self.outbox.borrow_mut().clear();
        self.bus.clear();
        self.state.clear_subscriptions();
        self.state.reset();
        info!(target: "session", "session cleaned up");
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.cleaned_up {
            Err(SessionError::CleanedUp)
        } else {
            Ok(())
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.cleanup();
    }
}
