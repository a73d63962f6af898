//! Event bus with one unbounded queue per subscriber
//!
//! Every published event gets the next sequence number. Numbering and
//! fan-out happen under one lock, so each subscriber receives every event
//! published after it subscribed, in sequence order, however far behind
//! it falls.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::types::{Event, EventEnvelope};

#[derive(Default)]
struct BusState {
    /// Last sequence number handed out
    sequence: u64,
    subscribers: Vec<mpsc::UnboundedSender<EventEnvelope>>,
}

/// Event bus for publishing and subscribing to events
#[derive(Clone, Default)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the sequenced envelope that was sent. Events published
    /// while nobody is subscribed are dropped but still consume a number.
    pub fn publish(&self, event: Event) -> EventEnvelope {
        let mut state = self.lock();
        state.sequence += 1;
        let envelope = EventEnvelope::new(event).with_sequence(state.sequence);
        state
            .subscribers
            .retain(|subscriber| subscriber.send(envelope.clone()).is_ok());
        envelope
    }

    /// Subscribe to events
    ///
    /// Events published before subscribing will not be received.
    pub fn subscribe(&self) -> EventSubscriber {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().subscribers.push(sender);
        EventSubscriber { receiver }
    }

    /// Get the number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|subscriber| !subscriber.is_closed());
        state.subscribers.len()
    }

    /// Sequence number of the most recently published event
    pub fn last_sequence(&self) -> u64 {
        self.lock().sequence
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("last_sequence", &self.last_sequence())
            .finish()
    }
}

/// Receiving end of one subscription. Nothing published after
/// `subscribe` is ever skipped.
#[derive(Debug)]
pub struct EventSubscriber {
    receiver: mpsc::UnboundedReceiver<EventEnvelope>,
}

impl EventSubscriber {
    /// Next event, or `None` once every handle to the bus is gone.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }

    /// Next already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.try_recv().ok()
    }
}
