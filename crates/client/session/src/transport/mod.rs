//! Transport abstraction underneath the connection manager.
//!
//! A [`Connector`] opens a [`Link`]: a sink for outgoing text frames and a
//! receiver for incoming ones. The connection manager never touches sockets
//! directly, so tests substitute [`mock::MockConnector`].

mod tcp;

pub mod mock;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use tcp::TcpConnector;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("link is closed")]
    Closed,

    #[error("connection refused: {0}")]
    Refused(String),
}

/// What arrives on a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(String),
    /// The peer went away. No further items follow.
    Closed { reason: Option<String> },
}

/// Outgoing half of an open link.
pub trait FrameSink: Send {
    /// Queues one frame for transmission.
    fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Closes the link. Further sends fail.
    fn close(&mut self);
}

/// An open link.
pub struct Link {
    pub sink: Box<dyn FrameSink>,
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
}

/// Opens links to an address.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Link, TransportError>;
}
