//! Starring messages for the member's saved list.

use crate::client::{Client, ClientError};
use crate::types::channel::Channel;
use crate::types::message::MessageId;
use log::warn;

/// Feature handle for star operations.
pub struct Star<'a> {
    client: &'a Client,
}

impl<'a> Star<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Flips the viewer's star on a message, rolling back on failure.
    /// Returns whether the message is starred after a successful toggle.
    pub async fn toggle(
        &self,
        channel: &Channel,
        message_id: &MessageId,
    ) -> Result<bool, ClientError> {
        let client = self.client;
        let member = client.config.member_id.clone();

        let starred = client
            .store
            .write()
            .await
            .toggle_star(channel, message_id, &member)
            .ok_or_else(|| ClientError::MessageNotFound(message_id.clone()))?;
        client.emit_updated_snapshot(channel, message_id).await;

        let result = if starred {
            client.api.star_message(channel, message_id).await
        } else {
            client.api.unstar_message(channel, message_id).await
        };

        if let Err(e) = result {
            warn!(target: "Client/Star", "Star toggle on {message_id} failed, rolling back: {e}");
            client
                .store
                .write()
                .await
                .toggle_star(channel, message_id, &member);
            client.emit_updated_snapshot(channel, message_id).await;
            return Err(e.into());
        }
        Ok(starred)
    }
}

impl Client {
    /// Access star operations.
    pub fn star(&self) -> Star<'_> {
        Star::new(self)
    }
}
