//! Event bus - fan-out pub/sub with bounded replay
//!
//! The bus is the only structure shared across execution contexts: the game
//! task publishes through a thread-safe handle while transport-layer
//! subscribers consume from their own bounded channels. Publishing never
//! blocks and never fails the publisher: a subscriber that cannot keep up
//! loses that single event, and a closed subscriber is pruned on the next
//! publish.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use howl_domain::{GameEvent, SubscriberId};

/// Default capacity of the replay ring buffer
pub const DEFAULT_BUFFER_CAPACITY: usize = 500;

/// Default capacity of each subscriber channel
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1000;

/// A live subscription: the channel to drain plus a replay snapshot of the
/// buffered history, ordered newest-first for client replay.
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<GameEvent>,
    pub replay: Vec<GameEvent>,
}

struct BusState {
    buffer: VecDeque<GameEvent>,
    subscribers: HashMap<SubscriberId, mpsc::Sender<GameEvent>>,
}

/// Fan-out event bus with a fixed-capacity replay buffer
pub struct EventBus {
    buffer_capacity: usize,
    subscriber_capacity: usize,
    state: Mutex<BusState>,
}

/// Shared reference to the event bus
pub type SharedEventBus = Arc<EventBus>;

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY, DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl EventBus {
    pub fn new(buffer_capacity: usize, subscriber_capacity: usize) -> Self {
        Self {
            buffer_capacity: buffer_capacity.max(1),
            subscriber_capacity: subscriber_capacity.max(1),
            state: Mutex::new(BusState {
                buffer: VecDeque::with_capacity(buffer_capacity),
                subscribers: HashMap::new(),
            }),
        }
    }

    /// Publish an event to every subscriber and append it to the replay
    /// buffer. Safe to call from any thread or task; never blocks.
    pub fn publish(&self, event: GameEvent) {
        let Ok(mut state) = self.state.lock() else {
            // A poisoned lock means a panic elsewhere; dropping the event is
            // the only non-blocking option left.
            return;
        };

        if state.buffer.len() == self.buffer_capacity {
            state.buffer.pop_front();
        }
        state.buffer.push_back(event.clone());

        let mut closed: Vec<SubscriberId> = Vec::new();
        for (id, sender) in &state.subscribers {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Slow consumer: drop this event for this subscriber only
                    tracing::debug!(subscriber = %id, "subscriber channel full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*id);
                }
            }
        }
        for id in closed {
            state.subscribers.remove(&id);
            tracing::debug!(subscriber = %id, "pruned closed subscriber");
        }
    }

    /// Register a new subscriber. The returned snapshot holds the most
    /// recent events newest-first, ready for client replay.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.subscriber_capacity);
        let id = SubscriberId::new();

        let replay = {
            let Ok(mut state) = self.state.lock() else {
                return Subscription {
                    id,
                    receiver,
                    replay: Vec::new(),
                };
            };
            state.subscribers.insert(id, sender);
            state.buffer.iter().rev().cloned().collect()
        };

        Subscription {
            id,
            receiver,
            replay,
        }
    }

    /// Remove a subscriber. Idempotent.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if let Ok(mut state) = self.state.lock() {
            state.subscribers.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.subscribers.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(n: u32) -> GameEvent {
        GameEvent::system(format!("event-{n}")).stamped("game", n)
    }

    #[test]
    fn test_replay_is_newest_first() {
        let bus = EventBus::new(500, 10);
        for n in 1..=5 {
            bus.publish(event(n));
        }
        let sub = bus.subscribe();
        let rounds: Vec<u32> = sub.replay.iter().map(|e| e.round).collect();
        assert_eq!(rounds, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_replay_is_capped_by_buffer_capacity() {
        let bus = EventBus::new(3, 10);
        for n in 1..=10 {
            bus.publish(event(n));
        }
        let sub = bus.subscribe();
        let rounds: Vec<u32> = sub.replay.iter().map(|e| e.round).collect();
        assert_eq!(rounds, vec![10, 9, 8]);
    }

    #[tokio::test]
    async fn test_delivery_after_subscription() {
        let bus = EventBus::new(500, 10);
        let mut sub = bus.subscribe();
        bus.publish(event(1));
        let received = sub.receiver.recv().await.expect("event");
        assert_eq!(received.round, 1);
    }

    #[tokio::test]
    async fn test_full_subscriber_drops_single_event_only() {
        let bus = EventBus::new(500, 2);
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();

        // Fill both channels, drain only the fast subscriber, then overflow
        bus.publish(event(1));
        bus.publish(event(2));
        assert_eq!(fast.receiver.recv().await.expect("event").round, 1);
        assert_eq!(fast.receiver.recv().await.expect("event").round, 2);
        bus.publish(event(3));

        // The fast subscriber sees everything
        assert_eq!(fast.receiver.recv().await.expect("event").round, 3);

        // The slow subscriber lost exactly the overflowing event
        assert_eq!(slow.receiver.recv().await.expect("event").round, 1);
        assert_eq!(slow.receiver.recv().await.expect("event").round, 2);
        assert!(slow.receiver.try_recv().is_err());

        // Neither subscriber was pruned
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_closed_subscriber_is_pruned_on_publish() {
        let bus = EventBus::new(500, 10);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub.receiver);
        bus.publish(event(1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new(500, 10);
        let sub = bus.subscribe();
        bus.unsubscribe(sub.id);
        bus.unsubscribe(sub.id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_from_worker_thread() {
        let bus: SharedEventBus = Arc::new(EventBus::new(500, 10));
        let mut sub = bus.subscribe();

        let publisher = bus.clone();
        let handle = std::thread::spawn(move || {
            for n in 1..=3 {
                publisher.publish(event(n));
            }
        });
        handle.join().expect("publisher thread");

        for expected in 1..=3 {
            let received = sub.receiver.recv().await.expect("event");
            assert_eq!(received.round, expected);
        }
    }
}
