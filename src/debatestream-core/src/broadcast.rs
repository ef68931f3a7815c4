//! Fan-out of debate events to live subscribers.
//!
//! Every subscriber owns a bounded FIFO queue. Publishing never waits on a
//! reader: a full queue loses the event for that subscriber only, and a queue
//! whose reader has gone away is removed. The last slot of each queue is kept
//! for terminal events, so a lagging reader still sees how the run ended.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::events::{DebateEvent, HEARTBEAT_FRAME};

/// Shared reference to a broadcaster.
pub type SharedBroadcaster = Arc<EventBroadcaster>;

pub type SubscriberId = u64;

struct SubscriberQueue {
    id: SubscriberId,
    tx: mpsc::Sender<DebateEvent>,
}

pub struct EventBroadcaster {
    subscribers: Mutex<Vec<SubscriberQueue>>,
    next_id: AtomicU64,
    capacity: usize,
    heartbeat: Duration,
}

impl EventBroadcaster {
    pub fn new(capacity: usize, heartbeat: Duration) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            heartbeat,
        }
    }

    pub fn shared(self) -> SharedBroadcaster {
        Arc::new(self)
    }

    /// Register a new subscriber. It sees every event published from now on.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // One extra slot held back for `run_end` / `error`.
        let (tx, rx) = mpsc::channel(self.capacity + 1);
        let count = {
            let mut subscribers = self.lock();
            subscribers.push(SubscriberQueue { id, tx });
            subscribers.len()
        };
        debug!(subscriber = id, subscribers = count, "subscriber added");

        Subscription {
            id,
            rx,
            heartbeat: self.heartbeat,
            finished: false,
            broadcaster: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        if subscribers.len() != before {
            debug!(subscriber = id, subscribers = subscribers.len(), "subscriber removed");
        }
    }

    /// Push an event to every subscriber without blocking.
    ///
    /// A subscriber that cannot take a terminal event is removed, so its
    /// reader ends after draining instead of waiting forever.
    pub fn publish(&self, event: DebateEvent) {
        let terminal = event.is_terminal();
        let mut subscribers = self.lock();
        subscribers.retain(|s| {
            if !terminal && s.tx.capacity() <= 1 && !s.tx.is_closed() {
                warn!(subscriber = s.id, event = event.name(), "subscriber queue full; event dropped");
                return true;
            }
            match s.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = s.id, event = event.name(), "subscriber queue full; removing");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = s.id, "subscriber gone; removing");
                    false
                }
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SubscriberQueue>> {
        // A poisoned list is still a valid list of senders.
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// What a subscriber reads next.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(DebateEvent),
    /// Nothing arrived within the heartbeat interval.
    Heartbeat,
}

impl StreamItem {
    pub fn to_sse_frame(&self) -> String {
        match self {
            StreamItem::Event(event) => event.to_sse_frame(),
            StreamItem::Heartbeat => HEARTBEAT_FRAME.to_string(),
        }
    }
}

/// One subscriber's end of the broadcast. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<DebateEvent>,
    heartbeat: Duration,
    finished: bool,
    broadcaster: Weak<EventBroadcaster>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or a heartbeat after an idle interval.
    ///
    /// Returns `None` after a terminal event has been handed out, or if the
    /// broadcaster went away.
    pub async fn next(&mut self) -> Option<StreamItem> {
        if self.finished {
            return None;
        }

        match tokio::time::timeout(self.heartbeat, self.rx.recv()).await {
            Ok(Some(event)) => {
                if event.is_terminal() {
                    self.close();
                }
                Some(StreamItem::Event(event))
            }
            Ok(None) => {
                self.close();
                None
            }
            Err(_) => Some(StreamItem::Heartbeat),
        }
    }

    /// Next event, skipping heartbeats.
    pub async fn next_event(&mut self) -> Option<DebateEvent> {
        loop {
            match self.next().await? {
                StreamItem::Event(event) => return Some(event),
                StreamItem::Heartbeat => continue,
            }
        }
    }

    fn close(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.rx.close();
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EndReason;

    fn fragment(text: &str) -> DebateEvent {
        DebateEvent::TokenFragment {
            speaker_id: "s".to_string(),
            fragment: text.to_string(),
        }
    }

    fn run_end() -> DebateEvent {
        DebateEvent::RunEnd {
            total_turns: 0,
            reason: EndReason::Completed,
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_every_event_in_order() {
        let broadcaster = EventBroadcaster::new(16, Duration::from_secs(5)).shared();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        broadcaster.publish(fragment("one"));
        broadcaster.publish(fragment("two"));

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.next_event().await, Some(fragment("one")));
            assert_eq!(sub.next_event().await, Some(fragment("two")));
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_only_later_events() {
        let broadcaster = EventBroadcaster::new(16, Duration::from_secs(5)).shared();
        broadcaster.publish(fragment("early"));
        let mut sub = broadcaster.subscribe();
        broadcaster.publish(fragment("late"));
        assert_eq!(sub.next_event().await, Some(fragment("late")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_subscriber_gets_heartbeat() {
        let broadcaster = EventBroadcaster::new(16, Duration::from_secs(30)).shared();
        let mut sub = broadcaster.subscribe();

        assert_eq!(sub.next().await, Some(StreamItem::Heartbeat));
        assert_eq!(StreamItem::Heartbeat.to_sse_frame(), HEARTBEAT_FRAME);

        broadcaster.publish(fragment("after idle"));
        assert_eq!(sub.next().await, Some(StreamItem::Event(fragment("after idle"))));
    }

    #[tokio::test]
    async fn test_terminal_event_closes_subscription() {
        let broadcaster = EventBroadcaster::new(16, Duration::from_secs(5)).shared();
        let mut sub = broadcaster.subscribe();

        broadcaster.publish(run_end());
        broadcaster.publish(fragment("ignored"));

        assert_eq!(sub.next().await, Some(StreamItem::Event(run_end())));
        assert_eq!(sub.next().await, None);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_for_that_subscriber() {
        let broadcaster = EventBroadcaster::new(2, Duration::from_secs(5)).shared();
        let mut stalled = broadcaster.subscribe();
        let mut reader = broadcaster.subscribe();

        for n in 0..4 {
            broadcaster.publish(fragment(&n.to_string()));
            assert_eq!(reader.next_event().await, Some(fragment(&n.to_string())));
        }

        assert_eq!(stalled.next_event().await, Some(fragment("0")));
        assert_eq!(stalled.next_event().await, Some(fragment("1")));
        assert_eq!(broadcaster.subscriber_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagging_subscriber_still_receives_run_end() {
        let broadcaster = EventBroadcaster::new(2, Duration::from_secs(5)).shared();
        let mut stalled = broadcaster.subscribe();

        for n in 0..3 {
            broadcaster.publish(fragment(&n.to_string()));
        }
        broadcaster.publish(run_end());

        let items = [
            stalled.next().await,
            stalled.next().await,
            stalled.next().await,
            stalled.next().await,
        ];
        assert_eq!(
            items,
            [
                Some(StreamItem::Event(fragment("0"))),
                Some(StreamItem::Event(fragment("1"))),
                Some(StreamItem::Event(run_end())),
                None,
            ]
        );
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_without_room_for_terminal_is_removed() {
        let broadcaster = EventBroadcaster::new(1, Duration::from_secs(5)).shared();
        let mut stalled = broadcaster.subscribe();

        broadcaster.publish(fragment("kept"));
        broadcaster.publish(run_end());
        // Queue now holds the fragment and the reserved terminal slot.
        broadcaster.publish(DebateEvent::Error {
            message: "late".to_string(),
        });
        assert_eq!(broadcaster.subscriber_count(), 0);

        assert_eq!(stalled.next_event().await, Some(fragment("kept")));
        assert_eq!(stalled.next_event().await, Some(run_end()));
        assert_eq!(stalled.next_event().await, None);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_removed() {
        let broadcaster = EventBroadcaster::new(4, Duration::from_secs(5)).shared();
        let sub = broadcaster.subscribe();
        let _other = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(sub);
        assert_eq!(broadcaster.subscriber_count(), 1);
        broadcaster.publish(fragment("still fine"));
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_explicit_unsubscribe() {
        let broadcaster = EventBroadcaster::new(4, Duration::from_secs(5)).shared();
        let sub = broadcaster.subscribe();
        broadcaster.unsubscribe(sub.id());
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
