//! Timeline loading and realtime message application.

use crate::client::{Client, ClientError};
use crate::store::RemoteApply;
use crate::types::channel::Channel;
use crate::types::message::Message;
use log::debug;

impl Client {
    /// Fetches the newest history page of a channel and merges it into the
    /// timeline. Returns how many previously unseen messages arrived.
    pub async fn load_newest(&self, channel: &Channel) -> Result<usize, ClientError> {
        let page = self
            .api
            .fetch_messages(channel, None, self.config.page_size)
            .await?;
        let merged = self.store.write().await.merge_page(channel, page);
        debug!(target: "Client/History", "Merged {merged} new messages into {channel}");
        Ok(merged)
    }

    /// Fetches the page preceding the oldest loaded message. Falls back to
    /// the head page when nothing is loaded yet.
    pub async fn load_older(&self, channel: &Channel) -> Result<usize, ClientError> {
        let before = {
            let store = self.store.read().await;
            store
                .messages(channel)
                .iter()
                .find(|m| !m.status.is_pending())
                .map(|m| m.id.clone())
        };
        let Some(before) = before else {
            return self.load_newest(channel).await;
        };

        let page = self
            .api
            .fetch_messages(channel, Some(&before), self.config.page_size)
            .await?;
        let merged = self.store.write().await.merge_page(channel, page);
        Ok(merged)
    }

    /// Applies a message record received over pub/sub: a brand new message,
    /// the echo of our own in-flight send, or a later revision (edit,
    /// delete, reaction change) of something already loaded.
    pub(crate) async fn apply_remote_message(&self, message: Message) {
        let (applied, stored) = self.store.write().await.apply_remote(message);
        match applied {
            RemoteApply::Added => self.emit_message_added(stored),
            RemoteApply::Updated => self.emit_message_updated(stored),
        }
    }
}
