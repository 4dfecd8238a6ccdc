//! Broadcast of state changes to the presentation layer.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::images::PollOutcome;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    SessionStarted,
    /// `expired` is true when the session ended because refresh failed.
    SessionEnded { expired: bool },
    ImagesLoaded { count: usize },
    ImageDeleted { id: i64 },
    ImageUpdated { id: i64 },
    PollFinished { target_id: i64, outcome: PollOutcome },
    Notice { level: NoticeLevel, message: String },
}

/// Cloneable sender. Publishing with no subscribers is fine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ClientEvent) {
        debug!("Event: {:?}", event);
        let _ = self.tx.send(event);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(ClientEvent::Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(ClientEvent::Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(ClientEvent::SessionStarted);
        bus.error("nobody listening");
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(ClientEvent::ImagesLoaded { count: 2 });
        bus.success("Image deleted successfully");

        assert_eq!(rx.recv().await.unwrap(), ClientEvent::ImagesLoaded { count: 2 });
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::Notice {
                level: NoticeLevel::Success,
                message: "Image deleted successfully".to_string(),
            }
        );
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(ClientEvent::ImageDeleted { id: 3 }).unwrap();
        assert_eq!(json["type"], "image_deleted");
        assert_eq!(json["id"], 3);
    }
}
