use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::{ChatPresenceUpdate, PubSubFrame};
use crate::types::presence::ChatStateType;
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ChatStatePayload {
    member: String,
    #[serde(default)]
    member_name: String,
    state: ChatStateType,
}

/// Handler for `chatstate` frames (typing indicators).
pub struct ChatStateHandler;

#[async_trait]
impl EventHandler for ChatStateHandler {
    fn event(&self) -> &'static str {
        "chatstate"
    }

    async fn handle(&self, client: Arc<Client>, frame: &PubSubFrame) {
        let Some(channel) = frame.channel() else {
            debug!(target: "Client", "Chatstate on foreign topic {}", frame.topic);
            return;
        };
        let payload: ChatStatePayload = match serde_json::from_value(frame.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "Client", "Discarding malformed chatstate frame: {e}");
                return;
            }
        };
        // The broker loops our own signals back; they are not presence.
        if payload.member == client.config().member_id {
            return;
        }

        client.note_remote_chatstate(
            &channel,
            payload.member.clone(),
            payload.member_name.clone(),
            payload.state,
        );
        client.emit_chat_presence(ChatPresenceUpdate {
            channel,
            member: payload.member,
            member_name: payload.member_name,
            state: payload.state,
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::create_wired_test_client;
    use crate::types::channel::Channel;
    use crate::types::events::PubSubFrame;

    fn chatstate_frame(channel: &Channel, member: &str, name: &str, state: &str) -> PubSubFrame {
        PubSubFrame::new(
            "chatstate",
            channel.topic(),
            serde_json::json!({"member": member, "member_name": name, "state": state}),
        )
    }

    #[tokio::test]
    async fn test_remote_composing_surfaces_in_summary() {
        let handles = create_wired_test_client();
        let channel = Channel::community("main");
        let mut presence = handles.client.events().chat_presence.subscribe();

        let frame = chatstate_frame(&channel, "m-ana", "Ana", "composing");
        handles
            .client
            .router
            .dispatch(handles.client.clone(), &frame)
            .await;

        let update = presence.recv().await.unwrap();
        assert_eq!(update.member, "m-ana");
        assert_eq!(
            handles.client.typing_summary(&channel).as_deref(),
            Some("Ana is typing...")
        );

        let frame = chatstate_frame(&channel, "m-ana", "Ana", "paused");
        handles
            .client
            .router
            .dispatch(handles.client.clone(), &frame)
            .await;
        assert_eq!(handles.client.typing_summary(&channel), None);
    }

    #[tokio::test]
    async fn test_own_echo_is_ignored() {
        let handles = create_wired_test_client();
        let channel = Channel::community("main");

        // Test clients authenticate as member "me".
        let frame = chatstate_frame(&channel, "me", "Me", "composing");
        handles
            .client
            .router
            .dispatch(handles.client.clone(), &frame)
            .await;
        assert_eq!(handles.client.typing_summary(&channel), None);
    }
}
