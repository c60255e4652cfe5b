use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::PubSubFrame;
use crate::types::message::Message;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

/// Handler for `message` frames: a record freshly fanned out by the broker,
/// possibly the echo of this client's own in-flight send.
pub struct MessageHandler;

#[async_trait]
impl EventHandler for MessageHandler {
    fn event(&self) -> &'static str {
        "message"
    }

    async fn handle(&self, client: Arc<Client>, frame: &PubSubFrame) {
        apply_message_frame(&client, frame).await;
    }
}

/// Handler for `message_update` frames: a later revision of an already
/// known record (edit, soft delete, reaction or star change). The payload
/// is the full record; last write wins.
pub struct MessageUpdateHandler;

#[async_trait]
impl EventHandler for MessageUpdateHandler {
    fn event(&self) -> &'static str {
        "message_update"
    }

    async fn handle(&self, client: Arc<Client>, frame: &PubSubFrame) {
        apply_message_frame(&client, frame).await;
    }
}

async fn apply_message_frame(client: &Client, frame: &PubSubFrame) {
    let message: Message = match serde_json::from_value(frame.payload.clone()) {
        Ok(message) => message,
        Err(e) => {
            warn!(target: "Client", "Discarding malformed message frame on {}: {e}", frame.topic);
            return;
        }
    };
    client.apply_remote_message(message).await;
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_wired_test_client, server_message};
    use crate::types::channel::Channel;
    use crate::types::events::PubSubFrame;

    #[tokio::test]
    async fn test_message_frame_lands_in_store() {
        let handles = create_wired_test_client();
        let channel = Channel::community("main");
        let msg = server_message(&channel, "srv-1", "ana", "good morning");

        let frame = PubSubFrame::new(
            "message",
            channel.topic(),
            serde_json::to_value(&msg).unwrap(),
        );
        let handled = handles
            .client
            .router
            .dispatch(handles.client.clone(), &frame)
            .await;
        assert!(handled);

        let messages = handles.client.messages(&channel).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "srv-1");
    }

    #[tokio::test]
    async fn test_update_frame_overwrites_existing_record() {
        let handles = create_wired_test_client();
        let channel = Channel::community("main");
        let msg = server_message(&channel, "srv-1", "ana", "good morning");
        handles
            .client
            .store
            .write()
            .await
            .merge_page(&channel, vec![msg.clone()]);

        let mut revised = msg;
        revised.deleted = true;
        let frame = PubSubFrame::new(
            "message_update",
            channel.topic(),
            serde_json::to_value(&revised).unwrap(),
        );
        handles
            .client
            .router
            .dispatch(handles.client.clone(), &frame)
            .await;

        let messages = handles.client.messages(&channel).await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].deleted);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let handles = create_wired_test_client();
        let channel = Channel::community("main");
        let frame = PubSubFrame::new(
            "message",
            channel.topic(),
            serde_json::json!({"this": "is not a message"}),
        );
        handles
            .client
            .router
            .dispatch(handles.client.clone(), &frame)
            .await;
        assert!(handles.client.messages(&channel).await.is_empty());
    }
}
