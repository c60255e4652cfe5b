//! In-memory message store.
//!
//! Holds one timeline per channel and reconciles three sources of truth:
//! server history pages, realtime frames, and locally optimistic entries.
//! The store is purely synchronous state; the client wraps it in a lock and
//! dispatches events for every mutation it applies.
//!
//! Reconciliation invariant: at most one optimistic copy of a logical send
//! exists per correlation id, and confirmation replaces that entry in place
//! rather than appending a second one — even when the pub/sub echo of the
//! same server record races the HTTP response.

use crate::types::channel::Channel;
use crate::types::message::{
    ClientMessageId, MemberId, Message, MessageBody, MessageId, MessageStatus,
};
use crate::types::presence::ReceiptKind;
use chrono::Utc;
use std::collections::HashMap;

/// How [`ChatStore::apply_remote`] folded a record into the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteApply {
    /// The record was new to this client.
    Added,
    /// The record replaced an existing entry (by correlation id or by
    /// server id; last write wins).
    Updated,
}

#[derive(Debug, Default)]
pub struct ChatStore {
    timelines: HashMap<Channel, Vec<Message>>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages of a channel, oldest first. Pending entries sit at their
    /// local insertion time.
    pub fn messages(&self, channel: &Channel) -> &[Message] {
        self.timelines.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn snapshot(&self, channel: &Channel) -> Vec<Message> {
        self.messages(channel).to_vec()
    }

    pub fn latest(&self, channel: &Channel) -> Option<&Message> {
        self.messages(channel).last()
    }

    pub fn oldest(&self, channel: &Channel) -> Option<&Message> {
        self.messages(channel).first()
    }

    pub fn get(&self, channel: &Channel, message_id: &str) -> Option<&Message> {
        self.messages(channel).iter().find(|m| m.id == message_id)
    }

    fn timeline_mut(&mut self, channel: &Channel) -> &mut Vec<Message> {
        self.timelines.entry(channel.clone()).or_default()
    }

    fn pending_position(timeline: &[Message], client_id: &str) -> Option<usize> {
        timeline
            .iter()
            .position(|m| m.status.is_pending() && m.client_id == client_id)
    }

    fn sort_timeline(timeline: &mut [Message]) {
        timeline.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    }

    /// Appends a locally originated entry. A pending entry with the same
    /// correlation id is replaced, never duplicated.
    pub fn insert_pending(&mut self, message: Message) {
        let timeline = self.timeline_mut(&message.channel.clone());
        match Self::pending_position(timeline, &message.client_id) {
            Some(idx) => timeline[idx] = message,
            None => timeline.push(message),
        }
    }

    /// Folds the server-confirmed record for a pending send back into the
    /// timeline and returns the stored copy. If the realtime echo already
    /// landed, the pending entry is dropped in favour of the existing record.
    pub fn confirm_pending(
        &mut self,
        channel: &Channel,
        client_id: &ClientMessageId,
        mut server: Message,
    ) -> Message {
        server.status = MessageStatus::Sent;
        let timeline = self.timeline_mut(channel);

        if let Some(pending_idx) = Self::pending_position(timeline, client_id) {
            let echo_idx = timeline
                .iter()
                .position(|m| m.id == server.id && !m.status.is_pending());
            match echo_idx {
                Some(idx) => {
                    timeline[idx] = server.clone();
                    timeline.remove(pending_idx);
                }
                None => timeline[pending_idx] = server.clone(),
            }
        } else if let Some(idx) = timeline.iter().position(|m| m.id == server.id) {
            // Echo raced us and already replaced the pending entry; the
            // HTTP response is just the later write.
            timeline[idx] = server.clone();
        } else {
            timeline.push(server.clone());
            Self::sort_timeline(timeline);
        }
        server
    }

    /// Flips a pending entry to `Failed` and returns the stored copy. The
    /// bubble stays in place for manual resend.
    pub fn mark_failed(&mut self, channel: &Channel, client_id: &ClientMessageId) -> Option<Message> {
        let timeline = self.timeline_mut(channel);
        let idx = Self::pending_position(timeline, client_id)?;
        timeline[idx].status = MessageStatus::Failed;
        Some(timeline[idx].clone())
    }

    /// Flips a failed entry back to `Sending` for a resend attempt. Returns
    /// `None` when the entry is missing or not in the failed state.
    pub fn begin_resend(
        &mut self,
        channel: &Channel,
        client_id: &ClientMessageId,
    ) -> Option<Message> {
        let timeline = self.timeline_mut(channel);
        let idx = Self::pending_position(timeline, client_id)?;
        if timeline[idx].status != MessageStatus::Failed {
            return None;
        }
        timeline[idx].status = MessageStatus::Sending;
        Some(timeline[idx].clone())
    }

    /// Merges one server history page. Entries are deduplicated by server
    /// id with last write wins; locally pending entries survive untouched.
    pub fn merge_page(&mut self, channel: &Channel, page: Vec<Message>) -> usize {
        let timeline = self.timeline_mut(channel);
        let mut merged = 0;
        for mut message in page {
            message.status = MessageStatus::Sent;
            if let Some(idx) = Self::pending_position(timeline, &message.client_id) {
                // Our own send resurfacing in a history fetch confirms it.
                timeline[idx] = message;
            } else if let Some(idx) = timeline.iter().position(|m| m.id == message.id) {
                timeline[idx] = message;
            } else {
                timeline.push(message);
                merged += 1;
            }
        }
        Self::sort_timeline(timeline);
        merged
    }

    /// Folds a realtime record (new message, edit, delete, reaction change
    /// from another client) into the timeline.
    pub fn apply_remote(&mut self, mut message: Message) -> (RemoteApply, Message) {
        message.status = MessageStatus::Sent;
        let channel = message.channel.clone();
        let timeline = self.timeline_mut(&channel);

        if let Some(idx) = Self::pending_position(timeline, &message.client_id) {
            // The echo of our own in-flight send.
            timeline[idx] = message.clone();
            (RemoteApply::Updated, message)
        } else if let Some(idx) = timeline.iter().position(|m| m.id == message.id) {
            timeline[idx] = message.clone();
            (RemoteApply::Updated, message)
        } else {
            timeline.push(message.clone());
            Self::sort_timeline(timeline);
            (RemoteApply::Added, message)
        }
    }

    /// Flips `member`'s reaction on a message. Returns whether the reaction
    /// is present after the flip, or `None` if the message is unknown.
    /// Rolling back a failed request is a second flip.
    pub fn toggle_reaction(
        &mut self,
        channel: &Channel,
        message_id: &MessageId,
        emoji: &str,
        member: &str,
    ) -> Option<bool> {
        let timeline = self.timeline_mut(channel);
        let message = timeline.iter_mut().find(|m| m.id == *message_id)?;
        let reactors = message.reactions.entry(emoji.to_string()).or_default();
        let added = if reactors.contains(member) {
            reactors.remove(member);
            false
        } else {
            reactors.insert(member.to_string());
            true
        };
        if message.reactions.get(emoji).is_some_and(|set| set.is_empty()) {
            message.reactions.remove(emoji);
        }
        Some(added)
    }

    /// Same contract as [`ChatStore::toggle_reaction`] for the star flag.
    pub fn toggle_star(
        &mut self,
        channel: &Channel,
        message_id: &MessageId,
        member: &str,
    ) -> Option<bool> {
        let timeline = self.timeline_mut(channel);
        let message = timeline.iter_mut().find(|m| m.id == *message_id)?;
        let starred = if message.starred_by.contains(member) {
            message.starred_by.remove(member);
            false
        } else {
            message.starred_by.insert(member.to_string());
            true
        };
        Some(starred)
    }

    /// Applies an edit and returns the pre-edit snapshot `(body, edited)`
    /// for rollback.
    pub fn apply_edit(
        &mut self,
        channel: &Channel,
        message_id: &MessageId,
        text: &str,
    ) -> Option<(MessageBody, bool)> {
        let timeline = self.timeline_mut(channel);
        let message = timeline.iter_mut().find(|m| m.id == *message_id)?;
        let snapshot = (message.body.clone(), message.edited);
        message.body = MessageBody::text(text);
        message.edited = true;
        message.updated_at = Some(Utc::now());
        Some(snapshot)
    }

    pub fn restore_body(
        &mut self,
        channel: &Channel,
        message_id: &MessageId,
        body: MessageBody,
        edited: bool,
    ) -> Option<Message> {
        let timeline = self.timeline_mut(channel);
        let message = timeline.iter_mut().find(|m| m.id == *message_id)?;
        message.body = body;
        message.edited = edited;
        Some(message.clone())
    }

    /// Sets the soft-delete flag and returns its previous value. Entries
    /// are never removed from the timeline.
    pub fn set_deleted(
        &mut self,
        channel: &Channel,
        message_id: &MessageId,
        deleted: bool,
    ) -> Option<bool> {
        let timeline = self.timeline_mut(channel);
        let message = timeline.iter_mut().find(|m| m.id == *message_id)?;
        let previous = message.deleted;
        message.deleted = deleted;
        Some(previous)
    }

    /// Records a delivered/read receipt and returns the updated messages.
    pub fn apply_receipt(
        &mut self,
        channel: &Channel,
        message_ids: &[MessageId],
        member: &str,
        kind: ReceiptKind,
    ) -> Vec<Message> {
        let timeline = self.timeline_mut(channel);
        let mut updated = Vec::new();
        for message in timeline.iter_mut() {
            if !message_ids.contains(&message.id) {
                continue;
            }
            let changed = match kind {
                ReceiptKind::Delivered => message.delivered_to.insert(member.to_string()),
                ReceiptKind::Read => {
                    // A read receipt implies delivery.
                    message.delivered_to.insert(member.to_string());
                    message.read_by.insert(member.to_string())
                }
            };
            if changed {
                updated.push(message.clone());
            }
        }
        updated
    }

    /// Adds/removes the viewer's own read mark, for the optimistic receipt
    /// flow. Returns whether anything changed.
    pub fn set_read_mark(
        &mut self,
        channel: &Channel,
        message_id: &MessageId,
        member: &str,
        read: bool,
    ) -> bool {
        let Some(message) = self
            .timeline_mut(channel)
            .iter_mut()
            .find(|m| m.id == *message_id)
        else {
            return false;
        };
        if read {
            message.read_by.insert(member.to_string())
        } else {
            message.read_by.remove(member)
        }
    }

    /// The newest server-confirmed message from another member, if the
    /// viewer has not read it yet. This is what the read-receipt aggregator
    /// targets when the viewer sits at the top of the feed; older unread
    /// history is deliberately not walked, the receipt acts as a watermark.
    pub fn latest_unread(&self, channel: &Channel, viewer: &MemberId) -> Option<&Message> {
        let latest_foreign = self
            .messages(channel)
            .iter()
            .rev()
            .find(|m| m.status == MessageStatus::Sent && !m.deleted && !m.is_from(viewer))?;
        if latest_foreign.read_by.contains(viewer) {
            return None;
        }
        Some(latest_foreign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Channel {
        Channel::community("main")
    }

    fn pending(client_id: &str, text: &str) -> Message {
        Message::pending(
            client_id.to_string(),
            channel(),
            "me".to_string(),
            "Me".to_string(),
            MessageBody::text(text),
        )
    }

    fn server(id: &str, client_id: &str, sender: &str, text: &str) -> Message {
        let mut msg = pending(client_id, text);
        msg.id = id.to_string();
        msg.sender = sender.to_string();
        msg.status = MessageStatus::Sent;
        msg
    }

    #[test]
    fn test_failed_send_leaves_single_failed_entry() {
        let mut store = ChatStore::new();
        store.merge_page(&channel(), vec![server("srv-1", "x-0", "ana", "hi")]);
        let before = store.snapshot(&channel());

        store.insert_pending(pending("1.2-0", "reply"));
        store.mark_failed(&channel(), &"1.2-0".to_string()).unwrap();

        let after = store.snapshot(&channel());
        assert_eq!(after.len(), before.len() + 1);
        let failed = after.last().unwrap();
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(failed.client_id, "1.2-0");
        // Everything that existed before the send is untouched.
        assert_eq!(&after[..before.len()], &before[..]);
    }

    #[test]
    fn test_confirm_replaces_in_place() {
        let mut store = ChatStore::new();
        store.insert_pending(pending("1.2-0", "hello"));
        store.confirm_pending(
            &channel(),
            &"1.2-0".to_string(),
            server("srv-9", "1.2-0", "me", "hello"),
        );

        let messages = store.snapshot(&channel());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "srv-9");
        assert_eq!(messages[0].status, MessageStatus::Sent);
    }

    #[test]
    fn test_echo_racing_http_response_does_not_duplicate() {
        let mut store = ChatStore::new();
        store.insert_pending(pending("1.2-0", "hello"));

        // Realtime echo lands first...
        let (applied, _) = store.apply_remote(server("srv-9", "1.2-0", "me", "hello"));
        assert_eq!(applied, RemoteApply::Updated);
        // ...then the HTTP response resolves.
        store.confirm_pending(
            &channel(),
            &"1.2-0".to_string(),
            server("srv-9", "1.2-0", "me", "hello"),
        );

        let messages = store.snapshot(&channel());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "srv-9");
    }

    #[test]
    fn test_resend_reuses_the_same_entry() {
        let mut store = ChatStore::new();
        store.insert_pending(pending("1.2-0", "hello"));
        store.mark_failed(&channel(), &"1.2-0".to_string()).unwrap();

        let restarted = store.begin_resend(&channel(), &"1.2-0".to_string()).unwrap();
        assert_eq!(restarted.status, MessageStatus::Sending);
        assert_eq!(store.snapshot(&channel()).len(), 1);

        // A resend of a message that is not failed is refused.
        assert!(store.begin_resend(&channel(), &"1.2-0".to_string()).is_none());
    }

    #[test]
    fn test_reaction_toggle_round_trip_restores_state() {
        let mut store = ChatStore::new();
        store.merge_page(&channel(), vec![server("srv-1", "x-0", "ana", "hi")]);
        let before = store.get(&channel(), "srv-1").unwrap().reactions.clone();

        let added = store
            .toggle_reaction(&channel(), &"srv-1".to_string(), "🙏", "me")
            .unwrap();
        assert!(added);
        // Rollback after a failed request is a second flip.
        let added = store
            .toggle_reaction(&channel(), &"srv-1".to_string(), "🙏", "me")
            .unwrap();
        assert!(!added);

        let after = store.get(&channel(), "srv-1").unwrap().reactions.clone();
        assert_eq!(before, after);
        // No empty reactor sets are left behind.
        assert!(!after.contains_key("🙏"));
    }

    #[test]
    fn test_merge_page_is_idempotent_and_last_write_wins() {
        let mut store = ChatStore::new();
        let first = server("srv-1", "x-0", "ana", "hi");
        store.merge_page(&channel(), vec![first.clone()]);
        assert_eq!(store.merge_page(&channel(), vec![first]), 0);

        let mut edited = server("srv-1", "x-0", "ana", "hi (edited)");
        edited.edited = true;
        store.merge_page(&channel(), vec![edited]);

        let messages = store.snapshot(&channel());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].edited);
        assert_eq!(messages[0].body.as_text(), Some("hi (edited)"));
    }

    #[test]
    fn test_merge_page_preserves_pending_entries() {
        let mut store = ChatStore::new();
        store.insert_pending(pending("1.2-0", "in flight"));
        store.merge_page(&channel(), vec![server("srv-1", "x-0", "ana", "hi")]);

        let messages = store.snapshot(&channel());
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.status == MessageStatus::Sending));
    }

    #[test]
    fn test_edit_snapshot_and_restore() {
        let mut store = ChatStore::new();
        store.merge_page(&channel(), vec![server("srv-1", "x-0", "me", "typo")]);

        let (body, edited) = store
            .apply_edit(&channel(), &"srv-1".to_string(), "fixed")
            .unwrap();
        assert_eq!(body.as_text(), Some("typo"));
        assert!(!edited);
        assert!(store.get(&channel(), "srv-1").unwrap().edited);

        store.restore_body(&channel(), &"srv-1".to_string(), body, edited);
        let msg = store.get(&channel(), "srv-1").unwrap();
        assert_eq!(msg.body.as_text(), Some("typo"));
        assert!(!msg.edited);
    }

    #[test]
    fn test_soft_delete_keeps_the_entry() {
        let mut store = ChatStore::new();
        store.merge_page(&channel(), vec![server("srv-1", "x-0", "me", "oops")]);

        let previous = store
            .set_deleted(&channel(), &"srv-1".to_string(), true)
            .unwrap();
        assert!(!previous);
        assert_eq!(store.snapshot(&channel()).len(), 1);
        assert!(store.get(&channel(), "srv-1").unwrap().deleted);
    }

    #[test]
    fn test_read_receipt_implies_delivery() {
        let mut store = ChatStore::new();
        store.merge_page(&channel(), vec![server("srv-1", "x-0", "me", "hi")]);

        let updated = store.apply_receipt(
            &channel(),
            &["srv-1".to_string()],
            "ana",
            ReceiptKind::Read,
        );
        assert_eq!(updated.len(), 1);
        let msg = store.get(&channel(), "srv-1").unwrap();
        assert!(msg.read_by.contains("ana"));
        assert!(msg.delivered_to.contains("ana"));

        // Re-applying the same receipt changes nothing.
        let updated = store.apply_receipt(
            &channel(),
            &["srv-1".to_string()],
            "ana",
            ReceiptKind::Read,
        );
        assert!(updated.is_empty());
    }

    #[test]
    fn test_latest_unread_skips_own_deleted_and_pending() {
        let mut store = ChatStore::new();
        let mut deleted = server("srv-3", "x-3", "ana", "gone");
        deleted.deleted = true;
        store.merge_page(
            &channel(),
            vec![
                server("srv-1", "x-1", "ana", "first"),
                server("srv-2", "x-2", "me", "mine"),
                deleted,
            ],
        );
        store.insert_pending(pending("1.2-0", "in flight"));

        let viewer = "me".to_string();
        let unread = store.latest_unread(&channel(), &viewer).unwrap();
        assert_eq!(unread.id, "srv-1");

        store.set_read_mark(&channel(), &"srv-1".to_string(), "me", true);
        assert!(store.latest_unread(&channel(), &viewer).is_none());
    }
}
