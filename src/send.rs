//! Optimistic send pipeline.
//!
//! A send appends a locally tagged entry before the request goes out, so the
//! feed gives instant feedback. The server response (or the realtime echo,
//! whichever lands first) replaces that entry; a failure flips it to
//! `Failed` and leaves the bubble for a manual resend. There is no durable
//! outbox and no automatic retry.

use crate::client::{Client, ClientError};
use crate::types::channel::Channel;
use crate::types::events::SendFailed;
use crate::types::message::{
    ClientMessageId, GeoPoint, MediaDescriptor, Message, MessageBody, MessageId,
};
use log::warn;
use std::sync::Arc;

impl Client {
    pub async fn send_text_message(
        &self,
        channel: Channel,
        text: &str,
    ) -> Result<MessageId, ClientError> {
        self.send_message_impl(channel, MessageBody::text(text)).await
    }

    pub async fn send_media_message(
        &self,
        channel: Channel,
        media: MediaDescriptor,
    ) -> Result<MessageId, ClientError> {
        self.send_message_impl(channel, MessageBody::Media(media)).await
    }

    pub async fn send_location_message(
        &self,
        channel: Channel,
        location: GeoPoint,
    ) -> Result<MessageId, ClientError> {
        self.send_message_impl(channel, MessageBody::Location(location))
            .await
    }

    async fn send_message_impl(
        &self,
        channel: Channel,
        body: MessageBody,
    ) -> Result<MessageId, ClientError> {
        let client_id = self.generate_request_id();
        let pending = Message::pending(
            client_id.clone(),
            channel.clone(),
            self.config.member_id.clone(),
            self.config.display_name.clone(),
            body.clone(),
        );

        self.store.write().await.insert_pending(pending.clone());
        self.emit_message_added(pending);

        self.dispatch_send(channel, client_id, body).await
    }

    /// Retries a failed send, reusing its correlation id so the entry is
    /// reconciled in place rather than duplicated.
    pub async fn resend_message(
        &self,
        channel: &Channel,
        client_id: &ClientMessageId,
    ) -> Result<MessageId, ClientError> {
        let restarted = self
            .store
            .write()
            .await
            .begin_resend(channel, client_id)
            .ok_or_else(|| ClientError::MessageNotFound(client_id.clone()))?;
        let body = restarted.body.clone();
        self.emit_message_updated(restarted);

        self.dispatch_send(channel.clone(), client_id.clone(), body)
            .await
    }

    async fn dispatch_send(
        &self,
        channel: Channel,
        client_id: ClientMessageId,
        body: MessageBody,
    ) -> Result<MessageId, ClientError> {
        match self.api.send_message(&channel, &client_id, &body).await {
            Ok(server) => {
                let stored = self
                    .store
                    .write()
                    .await
                    .confirm_pending(&channel, &client_id, server);
                let id = stored.id.clone();
                self.emit_message_updated(stored);
                Ok(id)
            }
            Err(e) => {
                warn!(target: "Client/Send", "Send {client_id} to {channel} failed: {e}");
                if let Some(failed) = self.store.write().await.mark_failed(&channel, &client_id) {
                    self.emit_message_updated(failed);
                }
                let _ = self.event_bus.send_failed.send(Arc::new(SendFailed {
                    channel,
                    client_id,
                    error: e.to_string(),
                }));
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_failing_test_client, create_test_client};
    use crate::types::message::MessageStatus;

    #[tokio::test]
    async fn test_send_reconciles_pending_entry() {
        let client = create_test_client();
        let channel = Channel::community("main");
        let mut added = client.events().message_added.subscribe();
        let mut updated = client.events().message_updated.subscribe();

        let id = client
            .send_text_message(channel.clone(), "grace and peace")
            .await
            .unwrap();
        assert!(id.starts_with("srv-"));

        // The optimistic entry was visible before the confirmation.
        let optimistic = added.recv().await.unwrap();
        assert_eq!(optimistic.status, MessageStatus::Sending);
        let confirmed = updated.recv().await.unwrap();
        assert_eq!(confirmed.id, id);
        assert_eq!(confirmed.client_id, optimistic.client_id);

        let messages = client.messages(&channel).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_failed_bubble_only() {
        let client = create_failing_test_client();
        let channel = Channel::community("main");
        let mut failures = client.events().send_failed.subscribe();

        let err = client
            .send_text_message(channel.clone(), "hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api(_)));

        let failure = failures.recv().await.unwrap();
        let messages = client.messages(&channel).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, MessageStatus::Failed);
        assert_eq!(messages[0].client_id, failure.client_id);
    }

    #[tokio::test]
    async fn test_resend_failed_message_succeeds_in_place() {
        let client = create_failing_test_client();
        let channel = Channel::community("main");
        let _ = client.send_text_message(channel.clone(), "try me").await;
        let client_id = client.messages(&channel).await[0].client_id.clone();

        // Resending through the still-failing backend keeps a single entry.
        let _ = client.resend_message(&channel, &client_id).await;
        let messages = client.messages(&channel).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn test_resend_unknown_message_is_refused() {
        let client = create_test_client();
        let channel = Channel::community("main");
        let err = client
            .resend_message(&channel, &"nope-0".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MessageNotFound(_)));
    }
}
