use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::{PresenceUpdate, PubSubFrame};
use crate::types::presence::PresenceStatus;
use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct PresencePayload {
    member: String,
    status: PresenceStatus,
}

/// Handler for `presence` frames.
pub struct PresenceHandler;

#[async_trait]
impl EventHandler for PresenceHandler {
    fn event(&self) -> &'static str {
        "presence"
    }

    async fn handle(&self, client: Arc<Client>, frame: &PubSubFrame) {
        let payload: PresencePayload = match serde_json::from_value(frame.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "Client", "Discarding malformed presence frame: {e}");
                return;
            }
        };
        let _ = client.events().presence.send(Arc::new(PresenceUpdate {
            member: payload.member,
            status: payload.status,
        }));
    }
}
