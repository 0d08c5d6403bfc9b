//! Bounded FIFO of envelopes waiting for a connection.

use std::collections::VecDeque;

use crate::protocol::Envelope;

#[derive(Debug)]
pub struct OfflineQueue {
    pending: VecDeque<Envelope>,
    capacity: usize,
    dropped: u64,
}

impl OfflineQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Appends `envelope`, evicting and returning the oldest one when full.
    pub fn push(&mut self, envelope: Envelope) -> Option<Envelope> {
        let evicted = if self.pending.len() >= self.capacity {
            self.dropped += 1;
            self.pending.pop_front()
        } else {
            None
        };
        self.pending.push_back(envelope);
        evicted
    }

    /// Puts an envelope that failed to transmit back at the head.
    ///
    /// The head is the oldest slot, so a full queue evicts `envelope` itself
    /// and hands it back.
    pub fn requeue(&mut self, envelope: Envelope) -> Option<Envelope> {
        if self.pending.len() >= self.capacity {
            self.dropped += 1;
            return Some(envelope);
        }
        self.pending.push_front(envelope);
        None
    }

    pub fn pop(&mut self) -> Option<Envelope> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Envelopes evicted over the queue's lifetime.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use game_core::Timestamp;

    use super::*;
    use crate::protocol::ClientAction;

    fn envelope(n: u64) -> Envelope {
        Envelope::new(ClientAction::PlayerMove, json!({ "n": n }), Timestamp(n))
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut queue = OfflineQueue::new(2);
        assert!(queue.push(envelope(1)).is_none());
        assert!(queue.push(envelope(2)).is_none());
        assert_eq!(queue.push(envelope(3)), Some(envelope(1)));
        assert_eq!(queue.dropped(), 1);

        assert_eq!(queue.pop(), Some(envelope(2)));
        assert_eq!(queue.pop(), Some(envelope(3)));
        assert!(queue.is_empty());
    }

    #[test]
    fn requeue_goes_to_the_front() {
        let mut queue = OfflineQueue::new(4);
        queue.push(envelope(2));
        queue.requeue(envelope(1));
        assert_eq!(queue.pop(), Some(envelope(1)));
        assert_eq!(queue.pop(), Some(envelope(2)));
    }

    #[test]
    fn requeue_into_a_full_queue_drops_the_oldest() {
        let mut queue = OfflineQueue::new(2);
        queue.push(envelope(2));
        queue.push(envelope(3));

        assert_eq!(queue.requeue(envelope(1)), Some(envelope(1)));
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop(), Some(envelope(2)));
        assert_eq!(queue.pop(), Some(envelope(3)));
    }
}
