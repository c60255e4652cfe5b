//! Message editing and soft deletion.

use crate::client::{Client, ClientError};
use crate::types::channel::Channel;
use crate::types::message::MessageId;
use log::warn;

/// Feature handle for edit/delete operations.
pub struct Editing<'a> {
    client: &'a Client,
}

impl<'a> Editing<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Replaces a message's text. The previous body is snapshotted and
    /// restored if the backend rejects the edit.
    pub async fn edit(
        &self,
        channel: &Channel,
        message_id: &MessageId,
        text: &str,
    ) -> Result<(), ClientError> {
        let client = self.client;
        let (previous_body, previous_edited) = client
            .store
            .write()
            .await
            .apply_edit(channel, message_id, text)
            .ok_or_else(|| ClientError::MessageNotFound(message_id.clone()))?;
        client.emit_updated_snapshot(channel, message_id).await;

        if let Err(e) = client.api.edit_message(channel, message_id, text).await {
            warn!(target: "Client/Editing", "Edit of {message_id} failed, restoring: {e}");
            client.store.write().await.restore_body(
                channel,
                message_id,
                previous_body,
                previous_edited,
            );
            client.emit_updated_snapshot(channel, message_id).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Soft-deletes a message. The entry stays in the timeline as a
    /// tombstone; the flag is cleared again if the request fails.
    pub async fn delete(
        &self,
        channel: &Channel,
        message_id: &MessageId,
    ) -> Result<(), ClientError> {
        let client = self.client;
        let already_deleted = client
            .store
            .write()
            .await
            .set_deleted(channel, message_id, true)
            .ok_or_else(|| ClientError::MessageNotFound(message_id.clone()))?;
        if already_deleted {
            return Ok(());
        }
        client.emit_updated_snapshot(channel, message_id).await;

        if let Err(e) = client.api.delete_message(channel, message_id).await {
            warn!(target: "Client/Editing", "Delete of {message_id} failed, restoring: {e}");
            client
                .store
                .write()
                .await
                .set_deleted(channel, message_id, false);
            client.emit_updated_snapshot(channel, message_id).await;
            return Err(e.into());
        }
        Ok(())
    }
}

impl Client {
    /// Access edit/delete operations.
    pub fn editing(&self) -> Editing<'_> {
        Editing::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        create_failing_test_client, create_test_client, server_message,
    };

    #[tokio::test]
    async fn test_edit_applies_and_flags() {
        let client = create_test_client();
        let channel = Channel::community("main");
        let msg = server_message(&channel, "srv-1", "me", "typo");
        client.store.write().await.merge_page(&channel, vec![msg]);

        client
            .editing()
            .edit(&channel, &"srv-1".to_string(), "fixed")
            .await
            .unwrap();

        let messages = client.messages(&channel).await;
        assert_eq!(messages[0].body.as_text(), Some("fixed"));
        assert!(messages[0].edited);
    }

    #[tokio::test]
    async fn test_failed_edit_restores_previous_body() {
        let client = create_failing_test_client();
        let channel = Channel::community("main");
        let msg = server_message(&channel, "srv-1", "me", "typo");
        client.store.write().await.merge_page(&channel, vec![msg]);

        let err = client
            .editing()
            .edit(&channel, &"srv-1".to_string(), "fixed")
            .await;
        assert!(err.is_err());

        let messages = client.messages(&channel).await;
        assert_eq!(messages[0].body.as_text(), Some("typo"));
        assert!(!messages[0].edited);
    }

    #[tokio::test]
    async fn test_delete_is_soft_and_reversible_on_failure() {
        let failing = create_failing_test_client();
        let channel = Channel::community("main");
        let msg = server_message(&channel, "srv-1", "me", "oops");
        failing.store.write().await.merge_page(&channel, vec![msg.clone()]);

        let err = failing.editing().delete(&channel, &"srv-1".to_string()).await;
        assert!(err.is_err());
        assert!(!failing.messages(&channel).await[0].deleted);

        let client = create_test_client();
        client.store.write().await.merge_page(&channel, vec![msg]);
        client
            .editing()
            .delete(&channel, &"srv-1".to_string())
            .await
            .unwrap();
        let messages = client.messages(&channel).await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].deleted);

        // Deleting a tombstone is a no-op.
        client
            .editing()
            .delete(&channel, &"srv-1".to_string())
            .await
            .unwrap();
    }
}
