//! Event bus for engagement operations
//!
//! Services emit an [`EngagementEvent`] after every successful write so
//! listeners can keep audit logs or invalidate downstream caches.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq)]
pub enum EngagementEvent {
    // Counters
    ViewRecorded {
        post_id: i64,
        views: u64,
    },
    WeeklyViewsDecayed {
        owner_id: i64,
        reset: usize,
    },

    // Posts
    PostCreated {
        id: i64,
        owner_id: i64,
        title: String,
    },
    PostUpdated {
        id: i64,
    },
    PostDeleted {
        id: i64,
    },

    // Taxonomy
    CategorySaved {
        id: i64,
        slug: String,
    },

    // Comments
    CommentCreated {
        id: i64,
        post_id: i64,
    },
    CommentDeleted {
        id: i64,
    },

    // Identities
    IdentityCreated {
        id: i64,
    },
    Followed {
        follower_id: i64,
        following_id: i64,
    },
    Unfollowed {
        follower_id: i64,
        following_id: i64,
    },
    ProfileUpdated {
        identity_id: i64,
    },
}

/// Broadcasts events to every subscriber
pub struct EventBus {
    sender: broadcast::Sender<EngagementEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: EngagementEvent) {
        trace!(event = ?event, "Emitting engagement event");
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngagementEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Log every event at debug level until the bus closes
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(EngagementEvent::PostCreated { id, owner_id, title }) => {
                    debug!(id, owner_id, title = %title, "Post created");
                }
                Ok(EngagementEvent::WeeklyViewsDecayed { owner_id, reset }) if reset > 0 => {
                    debug!(owner_id, reset, "Weekly views decayed");
                }
                Ok(event) => trace!(event = ?event, "Engagement event"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(EngagementEvent::ViewRecorded { post_id: 7, views: 3 });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");
        assert_eq!(event, EngagementEvent::ViewRecorded { post_id: 7, views: 3 });
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(EngagementEvent::PostDeleted { id: 1 });
    }
}
