//! Client session layer.
//!
//! Bridges local play to an authoritative peer:
//! - [`EventBus`]: typed three-channel publish/subscribe
//! - [`ReplicatedState`]: path-addressed state tree with deep-merge sync
//! - [`ConnectionManager`]: transport lifecycle, offline queue, backoff
//! - [`SessionCoordinator`]: the facade the game and UI layers use
//!
//! The session types are single-task (`!Send`); drive them from one task
//! with [`SessionCoordinator::poll`] or [`SessionCoordinator::next_event`].
pub mod connection;
pub mod events;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

pub use connection::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState, Delivery,
    reconnect_delay,
};
pub use events::{Channel, EventBus, EventName, HandlerId, LocalEvent, NetworkEvent, SyncEvent};
pub use protocol::{ClientAction, Envelope, ProtocolError, ServerAction};
pub use session::{ConnectionStatus, SessionCoordinator, SessionError, SessionMode};
pub use state::{ReplicatedState, StateError, SubscriptionId};
pub use transport::{Connector, FrameSink, Inbound, Link, TcpConnector, TransportError};
