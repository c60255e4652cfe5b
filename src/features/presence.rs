//! Online presence relay.
//!
//! Fire-and-forget, like the typing signals: no roster, no last-seen
//! bookkeeping, no acknowledgement. The broker fans the frame out to
//! whoever is subscribed.

use crate::client::{Client, ClientError};
use crate::types::events::PubSubFrame;
use crate::types::presence::PresenceStatus;
use log::debug;

/// Topic carrying member presence frames. Not channel-scoped; the broker
/// scopes it to the tenant the connection authenticated as.
pub(crate) const PRESENCE_TOPIC: &str = "presence";

/// Feature handle for presence operations.
pub struct Presence<'a> {
    client: &'a Client,
}

impl<'a> Presence<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Publishes the given presence status on the member's behalf.
    pub async fn set(&self, status: PresenceStatus) -> Result<(), ClientError> {
        debug!(target: "Client/Presence", "Sending presence {status}");
        let frame = PubSubFrame::new(
            "presence",
            PRESENCE_TOPIC,
            serde_json::json!({
                "member": self.client.config.member_id,
                "status": status,
            }),
        );
        self.client.publish_frame(&frame).await
    }

    /// Set presence to available (online).
    pub async fn available(&self) -> Result<(), ClientError> {
        self.set(PresenceStatus::Available).await
    }

    /// Set presence to unavailable (offline).
    pub async fn unavailable(&self) -> Result<(), ClientError> {
        self.set(PresenceStatus::Unavailable).await
    }
}

impl Client {
    /// Access presence operations.
    pub fn presence(&self) -> Presence<'_> {
        Presence::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::test_utils::create_wired_test_client;

    #[tokio::test]
    async fn test_presence_requires_connection() {
        let handles = create_wired_test_client();
        let err = handles.client.presence().available().await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn test_presence_frame_shape() {
        let handles = create_wired_test_client();
        handles.client.connect().await.unwrap();
        handles.client.presence().available().await.unwrap();

        let frames = handles.factory.transport().published_frames();
        let frame = frames
            .iter()
            .find(|f| f.event == "presence")
            .expect("presence frame published");
        assert_eq!(frame.topic, PRESENCE_TOPIC);
        assert_eq!(frame.payload["member"], "me");
        assert_eq!(frame.payload["status"], "available");
    }
}
