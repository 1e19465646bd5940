//! Event bus
//!
//! The bus abstraction plus an in-process implementation backed by tokio
//! broadcast channels, one per subscribed topic pattern.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

use crate::types::Event;

/// Event bus error types.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Failed to publish event
    #[error("Failed to publish event: {0}")]
    PublishError(String),

    /// Failed to subscribe
    #[error("Failed to subscribe: {0}")]
    SubscribeError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Subscription handle for receiving events.
pub struct Subscription {
    /// Subscription ID
    pub id: String,
    /// Topic pattern
    pub topic: String,
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event.
    ///
    /// A subscriber that fell behind skips the events it missed rather than
    /// failing.
    pub async fn recv(&mut self) -> EventBusResult<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "Subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed)
                }
            }
        }
    }

    /// Receive an event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

/// Event bus trait for publish/subscribe operations.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> EventBusResult<()>;

    /// Subscribe to a topic pattern.
    ///
    /// Patterns are dot-separated; `*` matches exactly one segment and `#`
    /// matches zero or more. `team.invitation.*` receives every invitation
    /// event, `team.#` receives everything.
    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription>;

    /// Get event bus stats.
    async fn stats(&self) -> EventBusStats;
}

/// Event bus statistics.
#[derive(Debug, Clone, Default)]
pub struct EventBusStats {
    /// Total events published
    pub events_published: u64,
    /// Total deliveries to subscriber channels
    pub events_delivered: u64,
    /// Active subscriptions
    pub active_subscriptions: usize,
}

/// In-memory event bus implementation.
///
/// Suitable for single-process deployments and tests.
pub struct MemoryEventBus {
    subscribers: RwLock<HashMap<String, broadcast::Sender<Event>>>,
    stats: RwLock<EventBusStats>,
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventBus")
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl MemoryEventBus {
    /// Create a new in-memory event bus.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            stats: RwLock::new(EventBusStats::default()),
            channel_capacity: capacity.max(1),
        }
    }

    /// Number of patterns with a live channel.
    pub async fn pattern_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Check if a topic matches a pattern.
    pub fn topic_matches(pattern: &str, topic: &str) -> bool {
        let pattern: Vec<&str> = pattern.split('.').collect();
        let topic: Vec<&str> = topic.split('.').collect();
        Self::segments_match(&pattern, &topic)
    }

    fn segments_match(pattern: &[&str], topic: &[&str]) -> bool {
        match pattern.split_first() {
            None => topic.is_empty(),
            Some((&"#", rest)) => {
                (0..=topic.len()).any(|skip| Self::segments_match(rest, &topic[skip..]))
            }
            Some((&head, rest)) => match topic.split_first() {
                Some((&segment, remaining)) if head == "*" || head == segment => {
                    Self::segments_match(rest, remaining)
                }
                _ => false,
            },
        }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> EventBusResult<()> {
        let topic = event.topic();

        let mut delivered = 0u64;
        let mut abandoned = Vec::new();
        {
            let subscribers = self.subscribers.read().await;
            for (pattern, sender) in subscribers.iter() {
                if sender.receiver_count() == 0 {
                    abandoned.push(pattern.clone());
                    continue;
                }
                // A send only fails when every receiver has been dropped.
                if Self::topic_matches(pattern, &topic) && sender.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        if !abandoned.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            // Re-check under the write lock; a subscribe may have revived a pattern.
            for pattern in abandoned {
                if subscribers
                    .get(&pattern)
                    .is_some_and(|sender| sender.receiver_count() == 0)
                {
                    subscribers.remove(&pattern);
                }
            }
        }

        let mut stats = self.stats.write().await;
        stats.events_published += 1;
        stats.events_delivered += delivered;

        tracing::debug!(topic = %topic, event_id = %event.id, delivered, "Event published");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription> {
        if topic.trim().is_empty() {
            return Err(EventBusError::SubscribeError("empty topic pattern".to_string()));
        }

        let receiver = {
            let mut subscribers = self.subscribers.write().await;
            match subscribers.get(topic) {
                Some(sender) => sender.subscribe(),
                None => {
                    let (sender, receiver) = broadcast::channel(self.channel_capacity);
                    subscribers.insert(topic.to_string(), sender);
                    receiver
                }
            }
        };

        self.stats.write().await.active_subscriptions += 1;

        Ok(Subscription {
            id: uuid::Uuid::now_v7().to_string(),
            topic: topic.to_string(),
            receiver,
        })
    }

    async fn stats(&self) -> EventBusStats {
        self.stats.read().await.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TeamEvent;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_topic_matching() {
        // Exact match
        assert!(MemoryEventBus::topic_matches("team.member.created", "team.member.created"));

        // Single wildcard
        assert!(MemoryEventBus::topic_matches("team.member.*", "team.member.created"));
        assert!(MemoryEventBus::topic_matches("team.*.created", "team.member.created"));
        assert!(!MemoryEventBus::topic_matches("team.*", "team.member.created"));

        // Multi-segment wildcard
        assert!(MemoryEventBus::topic_matches("team.#", "team.member.created"));
        assert!(MemoryEventBus::topic_matches("#", "team.member.created"));
        assert!(MemoryEventBus::topic_matches("team.#.created", "team.member.created"));
        assert!(MemoryEventBus::topic_matches("team.member.#", "team.member"));

        // Non-matches
        assert!(!MemoryEventBus::topic_matches("team.member.removed", "team.member.created"));
        assert!(!MemoryEventBus::topic_matches("team.invitation.*", "team.member.created"));
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = MemoryEventBus::new();
        let mut invitations = bus.subscribe("team.invitation.*").await.unwrap();
        let mut members = bus.subscribe("team.member.*").await.unwrap();

        let event = TeamEvent::InvitationRevoked {
            invitation_id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            revoked_by: Uuid::now_v7(),
        }
        .to_event()
        .unwrap();
        bus.publish(event.clone()).await.unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), invitations.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.id, event.id);
        assert!(members.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = MemoryEventBus::new();

        let stats = bus.stats().await;
        assert_eq!(stats.events_published, 0);
        assert_eq!(stats.active_subscriptions, 0);

        let _sub = bus.subscribe("team.#").await.unwrap();
        assert_eq!(bus.stats().await.active_subscriptions, 1);

        bus.publish(Event::new("member.created", serde_json::json!({})))
            .await
            .unwrap();

        let stats = bus.stats().await;
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.events_delivered, 1);
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_are_pruned_on_publish() {
        let bus = MemoryEventBus::new();
        let kept = bus.subscribe("team.member.*").await.unwrap();
        let dropped = bus.subscribe("team.invitation.*").await.unwrap();
        assert_eq!(bus.pattern_count().await, 2);

        drop(dropped);
        bus.publish(Event::new("member.created", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(bus.pattern_count().await, 1);

        // A pruned pattern can be subscribed again.
        let _again = bus.subscribe("team.invitation.*").await.unwrap();
        assert_eq!(bus.pattern_count().await, 2);
        drop(kept);
    }

    #[tokio::test]
    async fn test_empty_pattern_rejected() {
        let bus = MemoryEventBus::new();
        assert!(matches!(
            bus.subscribe("  ").await,
            Err(EventBusError::SubscribeError(_))
        ));
    }
}
