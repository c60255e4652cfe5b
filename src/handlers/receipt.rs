use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::PubSubFrame;
use crate::types::message::MessageId;
use crate::types::presence::ReceiptKind;
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ReceiptPayload {
    member: String,
    message_ids: Vec<MessageId>,
    kind: ReceiptKind,
}

/// Handler for `receipt` frames from other members.
pub struct ReceiptHandler;

#[async_trait]
impl EventHandler for ReceiptHandler {
    fn event(&self) -> &'static str {
        "receipt"
    }

    async fn handle(&self, client: Arc<Client>, frame: &PubSubFrame) {
        let Some(channel) = frame.channel() else {
            debug!(target: "Client", "Receipt on foreign topic {}", frame.topic);
            return;
        };
        let payload: ReceiptPayload = match serde_json::from_value(frame.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "Client", "Discarding malformed receipt frame: {e}");
                return;
            }
        };
        debug!(
            target: "Client",
            "Received {} receipt for {:?} from {}",
            payload.kind, payload.message_ids, payload.member
        );
        client
            .apply_remote_receipt(&channel, payload.message_ids, payload.member, payload.kind)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_wired_test_client, server_message};
    use crate::types::channel::Channel;
    use crate::types::events::PubSubFrame;

    #[tokio::test]
    async fn test_receipt_frame_marks_readers() {
        let handles = create_wired_test_client();
        let channel = Channel::community("main");
        let msg = server_message(&channel, "srv-1", "me", "announcement");
        handles
            .client
            .store
            .write()
            .await
            .merge_page(&channel, vec![msg]);

        let frame = PubSubFrame::new(
            "receipt",
            channel.topic(),
            serde_json::json!({
                "member": "m-ana",
                "message_ids": ["srv-1"],
                "kind": "read",
            }),
        );
        let handled = handles
            .client
            .router
            .dispatch(handles.client.clone(), &frame)
            .await;
        assert!(handled);

        let messages = handles.client.messages(&channel).await;
        assert!(messages[0].read_by.contains("m-ana"));
        assert!(messages[0].delivered_to.contains("m-ana"));
    }
}
