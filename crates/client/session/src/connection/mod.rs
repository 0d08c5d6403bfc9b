//! Connection lifecycle, offline queue and reconnect policy.
//!
//! [`ConnectionManager`] lives on its owner's task. Connection attempts,
//! inbound frames and reconnect timers run as spawned tasks that report
//! back through an internal channel; the owner drains it with
//! [`ConnectionManager::poll`] or [`ConnectionManager::next_event`]. Each
//! report carries the generation it was started under, and reports from a
//! superseded generation are discarded.

mod backoff;
mod config;
mod queue;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use game_core::{Clock, SystemClock};

use crate::events::{EventBus, NetworkEvent};
use crate::protocol::{ClientAction, Envelope, ServerAction};
use crate::transport::{Connector, FrameSink, Inbound, Link, TransportError};

pub use backoff::reconnect_delay;
pub use config::ConnectionConfig;
pub use queue::OfflineQueue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What [`ConnectionManager::send_action`] did with an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Queued { depth: usize },
}

/// Outcome of processing one internal report.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    Connected {
        address: String,
    },
    ConnectFailed {
        error: String,
        retry_in: Option<Duration>,
    },
    Disconnected {
        reason: Option<String>,
        retry_in: Option<Duration>,
    },
    Reconnecting {
        attempt: u32,
    },
    Message {
        action: ServerAction,
        data: Value,
    },
}

enum Signal {
    Opened { generation: u64, link: Link },
    Failed { generation: u64, error: TransportError },
    Frame { generation: u64, inbound: Inbound },
    ReconnectDue { generation: u64 },
}

impl Signal {
    fn generation(&self) -> u64 {
        match self {
            Self::Opened { generation, .. }
            | Self::Failed { generation, .. }
            | Self::Frame { generation, .. }
            | Self::ReconnectDue { generation } => *generation,
        }
    }
}

/// Owns the link to the authoritative peer.
///
/// Must be created and driven inside a tokio runtime.
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    bus: EventBus,

    state: ConnectionState,
    generation: u64,
    reconnect_attempts: u32,
    address: Option<String>,
    sink: Option<Box<dyn FrameSink>>,
    queue: OfflineQueue,
    /// Events raised outside signal handling, delivered before the next report.
    pending: VecDeque<ConnectionEvent>,

    signal_tx: mpsc::UnboundedSender<Signal>,
    signal_rx: mpsc::UnboundedReceiver<Signal>,
    attempt_task: Option<JoinHandle<()>>,
    forward_task: Option<JoinHandle<()>>,
    timer_task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>, bus: EventBus) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let queue = OfflineQueue::new(config.max_pending_actions);

        Self {
            config,
            connector,
            clock: Arc::new(SystemClock),
            bus,
            state: ConnectionState::Disconnected,
            generation: 0,
            reconnect_attempts: 0,
            address: None,
            sink: None,
            queue,
            pending: VecDeque::new(),
            signal_tx,
            signal_rx,
            attempt_task: None,
            forward_task: None,
            timer_task: None,
        }
    }

    /// Stamps envelopes with `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.set_clock(clock);
        self
    }

    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts connecting to `address`, superseding any previous link or
    /// pending reconnect. The outcome arrives through [`Self::poll`] or
    /// [`Self::next_event`].
    pub fn connect(&mut self, address: impl Into<String>) {
        let address = address.into();
        info!(target: "session::connection", %address, "connecting");

        self.teardown();
        self.address = Some(address);
        self.reconnect_attempts = 0;
        self.open();
    }

    /// Closes the link and cancels any reconnect. Queued actions are kept.
    pub fn disconnect(&mut self) {
        let was = self.state;
        self.generation += 1;
        self.teardown();
        self.state = ConnectionState::Disconnected;
        self.reconnect_attempts = 0;

        if was != ConnectionState::Disconnected {
            info!(target: "session::connection", "disconnected by client");
            self.bus.emit(
                NetworkEvent::Disconnected,
                &json!({ "reason": "client disconnect" }),
            );
        }
    }

    /// Transmits now when connected, otherwise queues for the next
    /// successful connect. Never waits.
    pub fn send_action(&mut self, action: ClientAction, data: Value) -> Delivery {
        let envelope = Envelope::new(action, data, self.clock.now());

        if self.state == ConnectionState::Connected {
            match self.transmit(envelope) {
                Ok(()) => return Delivery::Sent,
                Err(envelope) => {
                    self.requeue(envelope);
                    let lost = self.link_lost(Some("send failed".to_owned()));
                    self.pending.push_back(lost);
                }
            }
        } else {
            self.enqueue(envelope);
        }

        Delivery::Queued {
            depth: self.queue.len(),
        }
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Processes every report that is ready without waiting.
    pub fn poll(&mut self) -> Vec<ConnectionEvent> {
        let mut events: Vec<_> = self.pending.drain(..).collect();
        while let Ok(signal) = self.signal_rx.try_recv() {
            events.extend(self.handle_signal(signal));
            events.extend(self.pending.drain(..));
        }
        events
    }

    /// Waits for the next report that produces an event. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let signal = self.signal_rx.recv().await?;
            if let Some(event) = self.handle_signal(signal) {
                return Some(event);
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }

    pub fn dropped_actions(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn open(&mut self) {
        let Some(address) = self.address.clone() else {
            return;
        };
        self.generation += 1;
        self.state = ConnectionState::Connecting;

        let generation = self.generation;
        let connector = self.connector.clone();
        let tx = self.signal_tx.clone();
        self.attempt_task = Some(tokio::spawn(async move {
            let signal = match connector.connect(&address).await {
                Ok(link) => Signal::Opened { generation, link },
                Err(error) => Signal::Failed { generation, error },
            };
            let _ = tx.send(signal);
        }));
    }

    fn teardown(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.close();
        }
        for task in [
            self.attempt_task.take(),
            self.forward_task.take(),
            self.timer_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }

    fn handle_signal(&mut self, signal: Signal) -> Option<ConnectionEvent> {
        if signal.generation() != self.generation {
            debug!(
                target: "session::connection",
                stale = signal.generation(),
                current = self.generation,
                "discarding stale report"
            );
            if let Signal::Opened { mut link, .. } = signal {
                link.sink.close();
            }
            return None;
        }

        match signal {
            Signal::Opened { link, .. } => Some(self.on_opened(link)),
            Signal::Failed { error, .. } => Some(self.on_failed(error)),
            Signal::Frame {
                inbound: Inbound::Message(frame),
                ..
            } => self.on_frame(&frame),
            Signal::Frame {
                inbound: Inbound::Closed { reason },
                ..
            } => Some(self.link_lost(reason)),
            Signal::ReconnectDue { .. } => {
                if self.state != ConnectionState::Disconnected {
                    return None;
                }
                info!(
                    target: "session::connection",
                    attempt = self.reconnect_attempts,
                    "reconnecting"
                );
                self.open();
                Some(ConnectionEvent::Reconnecting {
                    attempt: self.reconnect_attempts,
                })
            }
        }
    }

    fn on_opened(&mut self, link: Link) -> ConnectionEvent {
        let Link { sink, mut inbound } = link;
        let address = self.address.clone().unwrap_or_default();

        self.state = ConnectionState::Connected;
        self.reconnect_attempts = 0;
        self.sink = Some(sink);

        let generation = self.generation;
        let tx = self.signal_tx.clone();
        self.forward_task = Some(tokio::spawn(async move {
            while let Some(inbound) = inbound.recv().await {
                let closed = matches!(inbound, Inbound::Closed { .. });
                if tx.send(Signal::Frame { generation, inbound }).is_err() || closed {
                    return;
                }
            }
            let _ = tx.send(Signal::Frame {
                generation,
                inbound: Inbound::Closed {
                    reason: Some("link ended".to_owned()),
                },
            });
        }));

        info!(
            target: "session::connection",
            %address,
            pending = self.queue.len(),
            "connected"
        );
        self.bus
            .emit(NetworkEvent::Connected, &json!({ "address": address }));

        if let Err(envelope) = self.flush_queue() {
            self.requeue(envelope);
            return self.link_lost(Some("send failed".to_owned()));
        }
        ConnectionEvent::Connected { address }
    }

    fn on_failed(&mut self, error: TransportError) -> ConnectionEvent {
        self.state = ConnectionState::Disconnected;
        let message = error.to_string();
        warn!(target: "session::connection", error = %message, "connection attempt failed");
        self.bus
            .emit(NetworkEvent::Error, &json!({ "message": message }));

        ConnectionEvent::ConnectFailed {
            error: message,
            retry_in: self.schedule_reconnect(),
        }
    }

    /// Unexpected loss of an open link.
    fn link_lost(&mut self, reason: Option<String>) -> ConnectionEvent {
        self.generation += 1;
        self.teardown();
        self.state = ConnectionState::Disconnected;

        warn!(target: "session::connection", reason = ?reason, "connection lost");
        self.bus
            .emit(NetworkEvent::Disconnected, &json!({ "reason": reason }));

        ConnectionEvent::Disconnected {
            reason,
            retry_in: self.schedule_reconnect(),
        }
    }

    fn on_frame(&mut self, frame: &str) -> Option<ConnectionEvent> {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(target: "session::connection", %error, "discarding malformed frame");
                return None;
            }
        };
        let action = match envelope.server_action() {
            Ok(action) => action,
            Err(error) => {
                warn!(target: "session::connection", %error, "discarding frame");
                return None;
            }
        };

        match action.sync_event() {
            Some(event) => {
                self.bus.emit(event, &envelope.data);
            }
            None => {
                self.send_action(ClientAction::Pong, envelope.data.clone());
            }
        }

        Some(ConnectionEvent::Message {
            action,
            data: envelope.data,
        })
    }

    /// Arms the next reconnect timer. `None` once attempts are exhausted.
    fn schedule_reconnect(&mut self) -> Option<Duration> {
        self.address.as_ref()?;
        if self.reconnect_attempts >= self.config.max_reconnect_attempts {
            warn!(
                target: "session::connection",
                attempts = self.reconnect_attempts,
                "reconnect attempts exhausted; waiting for an explicit connect"
            );
            return None;
        }

        self.reconnect_attempts += 1;
        let delay = reconnect_delay(self.config.reconnect_base_delay, self.reconnect_attempts);
        let generation = self.generation;
        let tx = self.signal_tx.clone();
        self.timer_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Signal::ReconnectDue { generation });
        }));

        debug!(
            target: "session::connection",
            attempt = self.reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        Some(delay)
    }

    fn requeue(&mut self, envelope: Envelope) {
        if let Some(evicted) = self.queue.requeue(envelope) {
            warn!(
                target: "session::connection",
                action = %evicted.action,
                capacity = self.config.max_pending_actions,
                "offline queue full; dropped unsent action"
            );
        }
    }

    fn enqueue(&mut self, envelope: Envelope) {
        if let Some(evicted) = self.queue.push(envelope) {
            warn!(
                target: "session::connection",
                action = %evicted.action,
                capacity = self.config.max_pending_actions,
                "offline queue full; dropped oldest action"
            );
        }
    }

    /// Sends queued envelopes oldest first, stopping at the first failure.
    fn flush_queue(&mut self) -> Result<(), Envelope> {
        while let Some(envelope) = self.queue.pop() {
            self.transmit(envelope)?;
        }
        Ok(())
    }

    /// Hands one envelope to the sink. Gives it back when the link refused it.
    fn transmit(&mut self, envelope: Envelope) -> Result<(), Envelope> {
        let frame = match envelope.encode() {
            Ok(frame) => frame,
            Err(error) => {
                warn!(target: "session::connection", action = %envelope.action, %error, "dropping unencodable action");
                return Ok(());
            }
        };
        let Some(sink) = self.sink.as_mut() else {
            return Err(envelope);
        };
        match sink.send(frame) {
            Ok(()) => Ok(()),
            Err(error) => {
                debug!(target: "session::connection", %error, "transmit failed");
                Err(envelope)
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
