//! Bounded FIFO queues backing input ports.

use crate::message::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A queue shared between the routing layer and a consumer's input context.
pub type SharedQueue = Arc<Mutex<MessageQueue>>;

/// Bounded first-in first-out message queue.
#[derive(Debug)]
pub struct MessageQueue {
    capacity: usize,
    items: VecDeque<Message>,
}

impl MessageQueue {
    /// Create a queue holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Create a shared handle to a new queue.
    pub fn shared(capacity: usize) -> SharedQueue {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Append a message, or hand it back if the queue is full.
    pub fn push(&mut self, message: Message) -> Result<(), Message> {
        if self.items.len() >= self.capacity {
            return Err(message);
        }
        self.items.push_back(message);
        Ok(())
    }

    /// Remove the oldest message.
    pub fn pop(&mut self) -> Option<Message> {
        self.items.pop_front()
    }

    /// The oldest message, without removing it.
    pub fn peek(&self) -> Option<&Message> {
        self.items.front()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Free slots.
    pub fn available(&self) -> usize {
        self.capacity - self.items.len()
    }

    /// Maximum number of messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
