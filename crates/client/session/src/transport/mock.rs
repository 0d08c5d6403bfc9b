//! In-process connector for tests and offline demos.
//!
//! Every link it opens writes into a shared frame log; the test drives the
//! peer side with [`MockConnector::inject`] and [`MockConnector::drop_link`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{Connector, FrameSink, Inbound, Link, TransportError};
use crate::protocol::Envelope;

/// One recorded connection attempt.
#[derive(Clone, Debug)]
pub struct Attempt {
    pub address: String,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    fail_remaining: u32,
    refuse_all: bool,
    fail_sends: bool,
    attempts: Vec<Attempt>,
    sent: Vec<String>,
    links_opened: u64,
    current: Option<(u64, mpsc::UnboundedSender<Inbound>)>,
}

/// Scriptable [`Connector`]. Clones share the same script and logs.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `count` attempts fail.
    pub fn fail_next(&self, count: u32) {
        self.lock().fail_remaining = count;
    }

    /// Every attempt fails until switched off.
    pub fn refuse_all(&self, refuse: bool) {
        self.lock().refuse_all = refuse;
    }

    /// Sends on open links fail until switched off.
    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.lock().attempts.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.lock().attempts.len()
    }

    pub fn links_opened(&self) -> u64 {
        self.lock().links_opened
    }

    /// Raw frames sent over any link, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Decoded envelopes sent over any link. Undecodable frames are skipped.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.lock()
            .sent
            .iter()
            .filter_map(|frame| Envelope::decode(frame).ok())
            .collect()
    }

    pub fn sent_actions(&self) -> Vec<String> {
        self.sent_envelopes()
            .into_iter()
            .map(|envelope| envelope.action)
            .collect()
    }

    pub fn is_linked(&self) -> bool {
        self.lock().current.is_some()
    }

    /// Delivers `frame` from the peer on the current link.
    pub fn inject(&self, frame: impl Into<String>) -> bool {
        match &self.lock().current {
            Some((_, tx)) => tx.send(Inbound::Message(frame.into())).is_ok(),
            None => false,
        }
    }

    /// Closes the current link from the peer side.
    pub fn drop_link(&self, reason: Option<&str>) -> bool {
        match self.lock().current.take() {
            Some((_, tx)) => tx
                .send(Inbound::Closed {
                    reason: reason.map(str::to_owned),
                })
                .is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, address: &str) -> Result<Link, TransportError> {
        let mut state = self.lock();
        state.attempts.push(Attempt {
            address: address.to_owned(),
            at: Instant::now(),
        });

        if state.refuse_all {
            return Err(TransportError::Refused(address.to_owned()));
        }
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(TransportError::Refused(address.to_owned()));
        }

        state.links_opened += 1;
        let id = state.links_opened;
        let (tx, rx) = mpsc::unbounded_channel();
        state.current = Some((id, tx));

        Ok(Link {
            sink: Box::new(MockSink {
                connector: self.clone(),
                id,
                closed: false,
            }),
            inbound: rx,
        })
    }
}

struct MockSink {
    connector: MockConnector,
    id: u64,
    closed: bool,
}

impl FrameSink for MockSink {
    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let mut state = self.connector.lock();
        let live = matches!(&state.current, Some((id, _)) if *id == self.id);
        if self.closed || !live || state.fail_sends {
            return Err(TransportError::Closed);
        }
        state.sent.push(frame);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        let mut state = self.connector.lock();
        if matches!(&state.current, Some((id, _)) if *id == self.id) {
            state.current = None;
        }
    }
}
