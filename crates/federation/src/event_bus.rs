//! A real bounded, best-effort event bus, standing in for the mock used
//! upstream of this module's grounding: subscribers keyed by event type,
//! publish never blocks the caller on slow handlers, and a full per-type
//! queue drops the oldest pending event rather than applying backpressure.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use core::AppError;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::protocol::FederatedEvent;

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: FederatedEvent);
}

struct Subscription {
    id: Uuid,
    handler: Arc<dyn EventHandler>,
}

struct Topic {
    queue: Mutex<VecDeque<FederatedEvent>>,
    capacity: usize,
    subscribers: Mutex<Vec<Subscription>>,
}

impl Topic {
    fn new(capacity: usize) -> Self {
        Self { queue: Mutex::new(VecDeque::new()), capacity, subscribers: Mutex::new(Vec::new()) }
    }
}

pub struct EventBus {
    topics: DashMap<String, Arc<Topic>>,
    default_capacity: usize,
}

impl EventBus {
    pub fn new(default_capacity: usize) -> Self {
        Self { topics: DashMap::new(), default_capacity }
    }

    fn topic(&self, event_type: &str) -> Arc<Topic> {
        self.topics
            .entry(event_type.to_string())
            .or_insert_with(|| Arc::new(Topic::new(self.default_capacity)))
            .clone()
    }

    pub fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> Uuid {
        let topic = self.topic(event_type);
        let id = Uuid::new_v4();
        topic.subscribers.lock().push(Subscription { id, handler });
        id
    }

    /// Returns whether a matching subscription was found and removed.
    pub fn unsubscribe(&self, event_type: &str, sub_id: Uuid) -> bool {
        let Some(topic) = self.topics.get(event_type) else { return false };
        let mut subscribers = topic.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != sub_id);
        subscribers.len() != before
    }

    /// Enqueues `event`, dropping the oldest queued event for this type if
    /// the bounded queue is full, then dispatches to subscribers in
    /// insertion order without blocking the caller.
    pub fn publish(&self, event: FederatedEvent) -> Result<(), AppError> {
        let topic = self.topic(&event.event_type);
        {
            let mut queue = topic.queue.lock();
            if queue.len() >= topic.capacity {
                queue.pop_front();
                warn!(event_type = %event.event_type, "event bus queue full, dropping oldest");
            }
            queue.push_back(event.clone());
        }

        let subscribers: Vec<Arc<dyn EventHandler>> =
            topic.subscribers.lock().iter().map(|s| s.handler.clone()).collect();
        let topic_for_drain = topic.clone();
        tokio::spawn(async move {
            {
                let mut queue = topic_for_drain.queue.lock();
                queue.retain(|e| e.id != event.id);
            }
            for handler in subscribers {
                handler.handle(event.clone()).await;
            }
        });
        Ok(())
    }

    pub fn pending_count(&self, event_type: &str) -> usize {
        self.topics.get(event_type).map(|t| t.queue.lock().len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: FederatedEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn subscribers_are_invoked_on_publish() {
        let bus = EventBus::new(10);
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("agent.started", Arc::new(CountingHandler { count: count.clone() }));
        bus.publish(FederatedEvent::new("agent.started", serde_json::json!({}), "test")).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new(10);
        let count = Arc::new(AtomicUsize::new(0));
        let id = bus.subscribe("agent.started", Arc::new(CountingHandler { count: count.clone() }));
        assert!(bus.unsubscribe("agent.started", id));
        bus.publish(FederatedEvent::new("agent.started", serde_json::json!({}), "test")).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_the_oldest_event() {
        let bus = EventBus::new(2);
        for i in 0..3 {
            bus.publish(FederatedEvent::new("x", serde_json::json!({"i": i}), "test")).unwrap();
        }
        assert!(bus.pending_count("x") <= 2);
    }
}
