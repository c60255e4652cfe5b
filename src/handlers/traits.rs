use crate::client::Client;
use crate::types::events::PubSubFrame;
use async_trait::async_trait;
use std::sync::Arc;

/// A handler for one pub/sub event name.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The `event` field this handler consumes.
    fn event(&self) -> &'static str;

    /// Processes a frame. Malformed payloads are logged and dropped; a
    /// handler never fails the pump.
    async fn handle(&self, client: Arc<Client>, frame: &PubSubFrame);
}
