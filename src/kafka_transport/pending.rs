//! Messages parked while the connection is not ready.

use std::collections::VecDeque;

use crate::broker::OutboundMessage;

/// FIFO queue of messages awaiting a ready connection.
///
/// Unbounded unless a capacity is supplied. No backpressure reaches the
/// caller: a bounded queue rejects the newest message instead.
#[derive(Debug, Default)]
pub struct PendingQueue {
    messages: VecDeque<OutboundMessage>,
    capacity: Option<usize>,
}

impl PendingQueue {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity,
        }
    }

    /// Append `message`, handing it back if the queue is full.
    pub fn enqueue(&mut self, message: OutboundMessage) -> Result<(), OutboundMessage> {
        if self
            .capacity
            .is_some_and(|capacity| self.messages.len() >= capacity)
        {
            return Err(message);
        }
        self.messages.push_back(message);
        Ok(())
    }

    /// Remove and return every queued message in submission order.
    pub fn drain_in_order(&mut self) -> Vec<OutboundMessage> {
        self.messages.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
