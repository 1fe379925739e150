//! Component E — the event fan-out bus. See spec §4.E.
//!
//! Subscribers each get a bounded ring buffer; a slow subscriber drops its
//! own oldest events rather than blocking a publisher or another
//! subscriber, the same isolation the teacher's SRT ingest ring buffer
//! gives a single reader against a single writer.

use crate::event::{FanoutEvent, Topic};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default per-subscriber ring buffer capacity. Chosen generously enough
/// that a subscriber keeping pace with publishers never drops; overrun
/// only happens under sustained subscriber stalls.
const DEFAULT_CAPACITY: usize = 1024;

struct RingBuffer {
    state: Mutex<RingState>,
    not_empty: Condvar,
    dropped: AtomicU64,
    capacity: usize,
}

struct RingState {
    buffer: VecDeque<FanoutEvent>,
    closed: bool,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                buffer: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            dropped: AtomicU64::new(0),
            capacity,
        }
    }

    fn push(&self, event: FanoutEvent) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if state.buffer.len() >= self.capacity {
            state.buffer.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        state.buffer.push_back(event);
        self.not_empty.notify_one();
    }

    fn recv_timeout(&self, timeout: Duration) -> Option<FanoutEvent> {
        let mut state = self.state.lock();
        if state.buffer.is_empty() && !state.closed {
            let result = self.not_empty.wait_for(&mut state, timeout);
            if result.timed_out() && state.buffer.is_empty() {
                return None;
            }
        }
        state.buffer.pop_front()
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.not_empty.notify_all();
    }
}

/// A handle a subscriber uses to read its events and learn how many it
/// has missed to overflow.
pub struct Subscription {
    id: u64,
    ring: Arc<RingBuffer>,
    bus: Arc<EventBusInner>,
}

impl Subscription {
    /// Block for up to `timeout` for the next event on this subscription.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FanoutEvent> {
        self.ring.recv_timeout(timeout)
    }

    /// Total events dropped for this subscriber due to ring overflow.
    pub fn dropped(&self) -> u64 {
        self.ring.dropped.load(Ordering::Relaxed)
    }

    /// Stop receiving. Idempotent — unsubscribing twice, or letting this
    /// handle drop after an explicit unsubscribe, is a no-op either way.
    pub fn unsubscribe(&self) {
        self.bus.unsubscribe(self.id, &self.ring);
    }
}

struct EventBusInner {
    topics: DashMap<Topic, Vec<(u64, Arc<RingBuffer>)>>,
}

impl EventBusInner {
    fn unsubscribe(&self, id: u64, ring: &Arc<RingBuffer>) {
        for mut entry in self.topics.iter_mut() {
            entry.value_mut().retain(|(sub_id, _)| *sub_id != id);
        }
        ring.close();
    }
}

/// The publish/subscribe bus tying every core component's events
/// together. One bus per [`crate::platform::Platform`].
pub struct EventBus {
    inner: Arc<EventBusInner>,
    next_id: AtomicUsize,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                topics: DashMap::new(),
            }),
            next_id: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Subscribe to a single topic. Each subscription gets its own ring
    /// buffer — subscribers never see or affect each other's backlog.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) as u64;
        let ring = Arc::new(RingBuffer::new(self.capacity));
        self.inner
            .topics
            .entry(topic)
            .or_default()
            .push((id, ring.clone()));
        Subscription {
            id,
            ring,
            bus: self.inner.clone(),
        }
    }

    /// Publish to every subscriber of `event`'s topic. Never blocks on a
    /// slow subscriber — overflow drops that subscriber's oldest event.
    pub fn publish(&self, event: FanoutEvent) {
        if let Some(subs) = self.inner.topics.get(&event.topic()) {
            for (_, ring) in subs.iter() {
                ring.push(event.clone());
            }
        }
    }

    /// Number of live subscriptions across all topics, for diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.inner.topics.iter().map(|e| e.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;

    fn node_added(version: u64) -> FanoutEvent {
        FanoutEvent::NodeAdded {
            version,
            node: crate::graph::Node::new(NodeId::from("a"), crate::types::NodeKind::Power, 1.0).unwrap(),
        }
    }

    #[test]
    fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let sub = bus.subscribe(Topic::GraphMutation);
        bus.publish(node_added(1));
        let event = sub.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(event, FanoutEvent::NodeAdded { .. }));
    }

    #[test]
    fn subscriber_only_sees_its_own_topic() {
        let bus = EventBus::default();
        let sub = bus.subscribe(Topic::SimulationStarted);
        bus.publish(node_added(1));
        assert!(sub.recv_timeout(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn overflow_drops_oldest_and_counts_it() {
        let bus = EventBus::new(2);
        let sub = bus.subscribe(Topic::GraphMutation);
        for v in 0..5 {
            bus.publish(node_added(v));
        }
        assert_eq!(sub.dropped(), 3);
        assert_eq!(sub.recv_timeout(Duration::from_millis(10)).is_some(), true);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let bus = EventBus::default();
        let sub = bus.subscribe(Topic::GraphMutation);
        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);
    }
}
