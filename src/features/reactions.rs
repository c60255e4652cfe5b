//! Emoji reaction toggling with optimistic rollback.

use crate::client::{Client, ClientError};
use crate::types::channel::Channel;
use crate::types::message::MessageId;
use log::warn;

/// Feature handle for reaction operations.
pub struct Reactions<'a> {
    client: &'a Client,
}

impl<'a> Reactions<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Flips the viewer's reaction on a message and pushes the change to the
    /// backend. On failure the local flip is inverted, leaving the reaction
    /// set exactly as it was. Returns whether the reaction is present after
    /// a successful toggle.
    pub async fn toggle(
        &self,
        channel: &Channel,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<bool, ClientError> {
        let client = self.client;
        let member = client.config.member_id.clone();

        let added = client
            .store
            .write()
            .await
            .toggle_reaction(channel, message_id, emoji, &member)
            .ok_or_else(|| ClientError::MessageNotFound(message_id.clone()))?;
        client.emit_updated_snapshot(channel, message_id).await;

        let result = if added {
            client.api.add_reaction(channel, message_id, emoji).await
        } else {
            client.api.remove_reaction(channel, message_id, emoji).await
        };

        if let Err(e) = result {
            warn!(target: "Client/Reactions", "Reaction {emoji} on {message_id} failed, rolling back: {e}");
            client
                .store
                .write()
                .await
                .toggle_reaction(channel, message_id, emoji, &member);
            client.emit_updated_snapshot(channel, message_id).await;
            return Err(e.into());
        }
        Ok(added)
    }
}

impl Client {
    /// Access reaction operations.
    pub fn reactions(&self) -> Reactions<'_> {
        Reactions::new(self)
    }

    /// Emits `message_updated` with the current stored copy of a message.
    pub(crate) async fn emit_updated_snapshot(&self, channel: &Channel, message_id: &MessageId) {
        let snapshot = self.store.read().await.get(channel, message_id).cloned();
        if let Some(message) = snapshot {
            self.emit_message_updated(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        create_failing_test_client, create_test_client, server_message,
    };

    #[tokio::test]
    async fn test_toggle_adds_then_removes() {
        let client = create_test_client();
        let channel = Channel::community("main");
        let msg = server_message(&channel, "srv-1", "ana", "hi");
        client.store.write().await.merge_page(&channel, vec![msg]);

        let id = "srv-1".to_string();
        assert!(client.reactions().toggle(&channel, &id, "🙏").await.unwrap());
        assert!(!client.reactions().toggle(&channel, &id, "🙏").await.unwrap());

        let messages = client.messages(&channel).await;
        assert!(messages[0].reactions.is_empty());
    }

    #[tokio::test]
    async fn test_failed_toggle_leaves_reactions_untouched() {
        let client = create_failing_test_client();
        let channel = Channel::community("main");
        let mut msg = server_message(&channel, "srv-1", "ana", "hi");
        msg.reactions
            .entry("🔥".to_string())
            .or_default()
            .insert("ana".to_string());
        client.store.write().await.merge_page(&channel, vec![msg]);
        let before = client.messages(&channel).await[0].reactions.clone();

        let err = client
            .reactions()
            .toggle(&channel, &"srv-1".to_string(), "🔥")
            .await;
        assert!(err.is_err());

        let after = client.messages(&channel).await[0].reactions.clone();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_toggle_unknown_message_is_refused() {
        let client = create_test_client();
        let channel = Channel::community("main");
        let err = client
            .reactions()
            .toggle(&channel, &"ghost".to_string(), "🙏")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MessageNotFound(_)));
    }
}
