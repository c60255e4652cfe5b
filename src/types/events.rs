use crate::types::channel::Channel;
use crate::types::message::{ClientMessageId, MemberId, Message, MessageId};
use crate::types::presence::{ChatStateType, PresenceStatus, ReceiptKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

/// Envelope of every frame exchanged with the pub/sub broker. The payload
/// shape depends on `event`; unknown events are ignored by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubFrame {
    pub event: String,
    pub topic: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PubSubFrame {
    pub fn new(event: impl Into<String>, topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            topic: topic.into(),
            payload,
        }
    }

    /// The channel this frame belongs to, if the topic is one of ours.
    pub fn channel(&self) -> Option<Channel> {
        Channel::from_topic(&self.topic)
    }
}

#[derive(Debug, Clone)]
pub struct Connected;

#[derive(Debug, Clone)]
pub struct Disconnected;

/// Emitted when an optimistic send fails and the bubble flips to `Failed`.
#[derive(Debug, Clone)]
pub struct SendFailed {
    pub channel: Channel,
    pub client_id: ClientMessageId,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ReceiptEvent {
    pub channel: Channel,
    pub message_ids: Vec<MessageId>,
    pub member: MemberId,
    pub kind: ReceiptKind,
    pub timestamp: DateTime<Utc>,
}

/// A member started or stopped typing in a channel.
#[derive(Debug, Clone)]
pub struct ChatPresenceUpdate {
    pub channel: Channel,
    pub member: MemberId,
    pub member_name: String,
    pub state: ChatStateType,
}

#[derive(Debug, Clone)]
pub struct PresenceUpdate {
    pub member: MemberId,
    pub status: PresenceStatus,
}

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with a separate broadcast channel per event type.
        /// Subscribers that lag behind simply miss events; nothing here is a
        /// delivery guarantee, it is a UI notification fan-out.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    // Connection events
    (connected, Arc<Connected>),
    (disconnected, Arc<Disconnected>),

    // Timeline events
    (message_added, Arc<Message>),
    (message_updated, Arc<Message>),
    (send_failed, Arc<SendFailed>),
    (receipt, Arc<ReceiptEvent>),

    // Presence events
    (chat_presence, Arc<ChatPresenceUpdate>),
    (presence, Arc<PresenceUpdate>),
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
    fn test_frame_channel_extraction() {
        let frame = PubSubFrame::new(
            "chatstate",
            Channel::community("42").topic(),
            serde_json::json!({"member": "m1", "state": "composing"}),
        );
        assert_eq!(frame.channel(), Some(Channel::community("42")));

        let foreign = PubSubFrame::new("chatstate", "announcements/42", serde_json::Value::Null);
        assert_eq!(foreign.channel(), None);
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.message_added.subscribe();
        let msg = Message::pending(
            "1.2-0".to_string(),
            Channel::community("42"),
            "m1".to_string(),
            "Ana".to_string(),
            crate::types::message::MessageBody::text("hi"),
        );
        bus.message_added.send(Arc::new(msg)).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.client_id, "1.2-0");
    }
}
