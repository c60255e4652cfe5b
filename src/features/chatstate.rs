//! Typing indicator relay.
//!
//! Outgoing signals are debounced per channel and carry a trailing timer: if
//! no further keystroke arrives within the configured timeout, a `paused`
//! signal goes out on its own. Remote composing entries expire after the
//! same window, so a peer that vanishes mid-sentence never leaves a stuck
//! "is typing" line. Everything is fire-and-forget over the pub/sub topic.

use crate::client::{Client, ClientError, TypingEntry};
use crate::types::channel::Channel;
use crate::types::events::PubSubFrame;
use crate::types::message::MemberId;
use crate::types::presence::ChatStateType;
use log::debug;
use std::sync::Arc;
use tokio::time::Instant;

/// Feature handle for typing state operations.
pub struct Chatstate<'a> {
    client: &'a Arc<Client>,
}

impl<'a> Chatstate<'a> {
    pub(crate) fn new(client: &'a Arc<Client>) -> Self {
        Self { client }
    }

    /// Reports a keystroke. Publishes a composing signal unless one went out
    /// within the debounce window, and (re)arms the trailing auto-pause.
    pub async fn composing(&self, channel: &Channel) -> Result<(), ClientError> {
        let client = self.client;
        let now = Instant::now();
        let debounced = client
            .typing_last_sent
            .get(channel)
            .map(|sent| now.duration_since(*sent) < client.config.typing_debounce)
            .unwrap_or(false);

        // Every keystroke extends the trailing window, debounced or not.
        let generation = {
            let mut entry = client.typing_generation.entry(channel.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        let timer_client = client.clone();
        let timer_channel = channel.clone();
        tokio::task::spawn(async move {
            tokio::time::sleep(timer_client.config.typing_timeout).await;
            let still_current = timer_client
                .typing_generation
                .get(&timer_channel)
                .map(|g| *g == generation)
                .unwrap_or(false);
            if !still_current {
                return;
            }
            timer_client.typing_last_sent.remove(&timer_channel);
            if let Err(e) = timer_client
                .publish_chatstate(&timer_channel, ChatStateType::Paused)
                .await
            {
                debug!(target: "Client/Chatstate", "Trailing pause for {timer_channel} not sent: {e}");
            }
        });

        if debounced {
            return Ok(());
        }
        client.typing_last_sent.insert(channel.clone(), now);
        client.publish_chatstate(channel, ChatStateType::Composing).await
    }

    /// Reports that the viewer stopped typing (cleared the input, sent the
    /// message, left the screen). Disarms the trailing timer.
    pub async fn paused(&self, channel: &Channel) -> Result<(), ClientError> {
        let client = self.client;
        {
            let mut entry = client.typing_generation.entry(channel.clone()).or_insert(0);
            *entry += 1;
        }
        client.typing_last_sent.remove(channel);
        client.publish_chatstate(channel, ChatStateType::Paused).await
    }
}

impl Client {
    /// Access typing state operations.
    pub fn chatstate(self: &Arc<Self>) -> Chatstate<'_> {
        Chatstate::new(self)
    }

    pub(crate) async fn publish_chatstate(
        &self,
        channel: &Channel,
        state: ChatStateType,
    ) -> Result<(), ClientError> {
        debug!(target: "Client/Chatstate", "Sending {state} to {channel}");
        let frame = PubSubFrame::new(
            "chatstate",
            channel.topic(),
            serde_json::json!({
                "member": self.config.member_id,
                "member_name": self.config.display_name,
                "state": state,
            }),
        );
        self.publish_frame(&frame).await
    }

    /// Records a remote typing transition decoded from a pub/sub frame.
    pub(crate) fn note_remote_chatstate(
        &self,
        channel: &Channel,
        member: MemberId,
        name: String,
        state: ChatStateType,
    ) {
        match state {
            ChatStateType::Composing => {
                self.typing_remote.entry(channel.clone()).or_default().insert(
                    member,
                    TypingEntry {
                        name,
                        seen: Instant::now(),
                    },
                );
            }
            ChatStateType::Paused => {
                if let Some(mut members) = self.typing_remote.get_mut(channel) {
                    members.remove(&member);
                }
            }
        }
    }

    /// Renders the channel's current typing table into a presence string for
    /// the UI, dropping entries older than the typing timeout.
    pub fn typing_summary(&self, channel: &Channel) -> Option<String> {
        let timeout = self.config.typing_timeout;
        let mut members = self.typing_remote.get_mut(channel)?;
        members.retain(|_, entry| entry.seen.elapsed() < timeout);

        let mut names: Vec<&str> = members.values().map(|e| e.name.as_str()).collect();
        if names.is_empty() {
            return None;
        }
        names.sort_unstable();
        Some(match names.len() {
            1 => format!("{} is typing...", names[0]),
            2 => format!("{} and {} are typing...", names[0], names[1]),
            _ => "Several people are typing...".to_string(),
        })
    }
}
