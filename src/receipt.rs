//! Read-receipt aggregation.
//!
//! When the viewer sits at the top of the feed the UI calls
//! [`Client::mark_visible_read`]; the aggregator picks the newest unread
//! message from someone else and reports it read, at most once per message
//! per visit. Receipts arriving from other members are folded into the
//! affected messages.

use crate::client::{Client, ClientError};
use crate::types::channel::Channel;
use crate::types::events::ReceiptEvent;
use crate::types::message::{MemberId, MessageId};
use crate::types::presence::ReceiptKind;
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;

impl Client {
    /// Marks the latest unread message of `channel` as read on the viewer's
    /// behalf. Returns the id that was marked, or `None` when there is
    /// nothing new or it was already marked during this visit.
    ///
    /// On request failure both the local read mark and the visit marker are
    /// reverted, so a later visit can try again.
    pub async fn mark_visible_read(
        &self,
        channel: &Channel,
    ) -> Result<Option<MessageId>, ClientError> {
        let viewer = &self.config.member_id;
        let candidate = {
            let store = self.store.read().await;
            store.latest_unread(channel, viewer).map(|m| m.id.clone())
        };
        let Some(message_id) = candidate else {
            return Ok(None);
        };

        {
            let mut markers = self.visit_markers.entry(channel.clone()).or_default();
            if !markers.insert(message_id.clone()) {
                debug!(target: "Client/Receipt", "{message_id} already marked this visit");
                return Ok(None);
            }
        }

        self.store
            .write()
            .await
            .set_read_mark(channel, &message_id, viewer, true);

        match self
            .api
            .send_receipt(channel, &message_id, ReceiptKind::Read)
            .await
        {
            Ok(()) => {
                info!(target: "Client/Receipt", "Marked {message_id} read in {channel}");
                Ok(Some(message_id))
            }
            Err(e) => {
                self.store
                    .write()
                    .await
                    .set_read_mark(channel, &message_id, viewer, false);
                if let Some(mut markers) = self.visit_markers.get_mut(channel) {
                    markers.remove(&message_id);
                }
                Err(e.into())
            }
        }
    }

    /// Folds a delivered/read receipt from another member into the store
    /// and notifies subscribers.
    pub(crate) async fn apply_remote_receipt(
        &self,
        channel: &Channel,
        message_ids: Vec<MessageId>,
        member: MemberId,
        kind: ReceiptKind,
    ) {
        let updated = self
            .store
            .write()
            .await
            .apply_receipt(channel, &message_ids, &member, kind);
        for message in updated {
            self.emit_message_updated(message);
        }
        let _ = self.event_bus.receipt.send(Arc::new(ReceiptEvent {
            channel: channel.clone(),
            message_ids,
            member,
            kind,
            timestamp: Utc::now(),
        }));
    }
}
