use crate::api::{ApiError, ChatApi};
use crate::config::ClientConfig;
use crate::handlers::router::EventRouter;
use crate::net::{HttpClient, Transport, TransportEvent, TransportFactory};
use crate::store::ChatStore;
use crate::types::channel::Channel;
use crate::types::events::{ChatPresenceUpdate, Connected, Disconnected, EventBus, PubSubFrame};
use crate::types::message::{MemberId, Message, MessageId};
use dashmap::DashMap;
use log::{debug, info, warn};
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock, mpsc};
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client is not connected")]
    NotConnected,
    #[error("client is already connected")]
    AlreadyConnected,
    #[error("transport error: {0}")]
    Transport(anyhow::Error),
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("unknown message {0}")]
    MessageNotFound(MessageId),
}

/// A remote member currently composing in some channel.
#[derive(Debug, Clone)]
pub(crate) struct TypingEntry {
    pub name: String,
    pub seen: Instant,
}

pub struct Client {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) api: ChatApi,
    pub(crate) store: RwLock<ChatStore>,
    pub(crate) event_bus: EventBus,

    pub(crate) transport: Mutex<Option<Arc<dyn Transport>>>,
    pub(crate) transport_factory: Arc<dyn TransportFactory>,
    pub(crate) is_connected: AtomicBool,
    pub(crate) is_connecting: AtomicBool,
    pub(crate) shutdown_notifier: Notify,

    pub(crate) unique_id: String,
    pub(crate) id_counter: AtomicU64,

    /// Router for dispatching pub/sub frames to their handlers.
    pub(crate) router: EventRouter,

    /// Channels the viewer currently has open; their topics are
    /// (re)subscribed on connect.
    pub(crate) open_channels: DashMap<Channel, ()>,
    /// Message ids already marked read in the current visit, per channel.
    pub(crate) visit_markers: DashMap<Channel, HashSet<MessageId>>,

    /// Remote members composing right now, per channel.
    pub(crate) typing_remote: DashMap<Channel, HashMap<MemberId, TypingEntry>>,
    /// Debounce clock for outgoing composing signals, per channel.
    pub(crate) typing_last_sent: DashMap<Channel, Instant>,
    /// Bumped on every local chatstate transition; stale trailing timers
    /// compare against it and give up.
    pub(crate) typing_generation: DashMap<Channel, u64>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        http_client: Arc<dyn HttpClient>,
        transport_factory: Arc<dyn TransportFactory>,
    ) -> Arc<Self> {
        let mut unique_id_bytes = [0u8; 2];
        rand::rng().fill_bytes(&mut unique_id_bytes);

        let config = Arc::new(config);
        Arc::new(Self {
            api: ChatApi::new(http_client, config.clone()),
            config,
            store: RwLock::new(ChatStore::new()),
            event_bus: EventBus::new(),
            transport: Mutex::new(None),
            transport_factory,
            is_connected: AtomicBool::new(false),
            is_connecting: AtomicBool::new(false),
            shutdown_notifier: Notify::new(),
            unique_id: format!("{}.{}", unique_id_bytes[0], unique_id_bytes[1]),
            id_counter: AtomicU64::new(0),
            router: EventRouter::default_router(),
            open_channels: DashMap::new(),
            visit_markers: DashMap::new(),
            typing_remote: DashMap::new(),
            typing_last_sent: DashMap::new(),
            typing_generation: DashMap::new(),
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Acquire)
    }

    /// Generates a new unique correlation id string.
    pub(crate) fn generate_request_id(&self) -> String {
        let count = self.id_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.unique_id, count)
    }

    /// Dials the broker and starts the frame pump. There is no automatic
    /// reconnect; when the transport drops, a `disconnected` event fires and
    /// the embedding app decides whether to call this again.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        if self.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }
        if self.is_connecting.swap(true, Ordering::AcqRel) {
            return Err(ClientError::AlreadyConnected);
        }
        let _guard = scopeguard::guard((), |_| {
            self.is_connecting.store(false, Ordering::Release);
        });

        let (transport, events) = self
            .transport_factory
            .create_transport()
            .await
            .map_err(ClientError::Transport)?;
        *self.transport.lock().await = Some(transport);
        self.is_connected.store(true, Ordering::Release);

        let pump_client = self.clone();
        tokio::task::spawn(pump_client.frame_pump(events));

        info!(target: "Client", "Connected to broker");
        let _ = self.event_bus.connected.send(Arc::new(Connected));

        // Re-establish topic subscriptions for channels the viewer has open.
        let topics: Vec<Channel> = self.open_channels.iter().map(|e| e.key().clone()).collect();
        for channel in topics {
            if let Err(e) = self.subscribe_topic(&channel).await {
                warn!(target: "Client", "Failed to resubscribe {channel}: {e}");
            }
        }
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.shutdown_notifier.notify_waiters();
        if let Some(transport) = self.transport.lock().await.take() {
            transport.disconnect().await;
        }
        if self.is_connected.swap(false, Ordering::AcqRel) {
            info!(target: "Client", "Disconnected from broker");
            let _ = self.event_bus.disconnected.send(Arc::new(Disconnected));
        }
    }

    /// Begins a visit: clears the read-receipt visit markers and subscribes
    /// the channel topic if connected.
    pub async fn open_channel(&self, channel: &Channel) -> Result<(), ClientError> {
        self.visit_markers.insert(channel.clone(), HashSet::new());
        self.open_channels.insert(channel.clone(), ());
        if self.is_connected() {
            self.subscribe_topic(channel).await?;
        }
        Ok(())
    }

    /// Ends a visit. Typing state for the channel is dropped immediately.
    pub async fn close_channel(&self, channel: &Channel) {
        self.visit_markers.remove(channel);
        self.open_channels.remove(channel);
        self.typing_remote.remove(channel);
        if self.is_connected() {
            let frame = PubSubFrame::new("unsubscribe", channel.topic(), serde_json::Value::Null);
            if let Err(e) = self.publish_frame(&frame).await {
                debug!(target: "Client", "Failed to unsubscribe {channel}: {e}");
            }
        }
    }

    async fn subscribe_topic(&self, channel: &Channel) -> Result<(), ClientError> {
        let frame = PubSubFrame::new("subscribe", channel.topic(), serde_json::Value::Null);
        self.publish_frame(&frame).await
    }

    /// Serializes and publishes a frame on the broker connection.
    pub(crate) async fn publish_frame(&self, frame: &PubSubFrame) -> Result<(), ClientError> {
        let transport = self
            .transport
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NotConnected)?;
        let bytes = serde_json::to_vec(frame)
            .map_err(|e| ClientError::Transport(anyhow::Error::new(e)))?;
        transport
            .publish(&bytes)
            .await
            .map_err(ClientError::Transport)
    }

    async fn frame_pump(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(TransportEvent::Connected) => {
                        debug!(target: "Client", "Transport reported connected");
                    }
                    Some(TransportEvent::FrameReceived(data)) => {
                        self.handle_frame(&data).await;
                    }
                    Some(TransportEvent::Disconnected) | None => {
                        if self.is_connected.swap(false, Ordering::AcqRel) {
                            warn!(target: "Client", "Broker connection lost");
                            let _ = self.event_bus.disconnected.send(Arc::new(Disconnected));
                        }
                        return;
                    }
                },
                _ = self.shutdown_notifier.notified() => {
                    debug!(target: "Client", "Shutdown signaled, exiting frame pump");
                    return;
                }
            }
        }
    }

    async fn handle_frame(self: &Arc<Self>, data: &[u8]) {
        let frame: PubSubFrame = match serde_json::from_slice(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(target: "Client", "Discarding malformed frame: {e}");
                return;
            }
        };
        if !self.router.dispatch(self.clone(), &frame).await {
            debug!(target: "Client", "No handler for event '{}'", frame.event);
        }
    }

    /// Snapshot of a channel's timeline, oldest first.
    pub async fn messages(&self, channel: &Channel) -> Vec<Message> {
        self.store.read().await.snapshot(channel)
    }

    pub(crate) fn emit_message_added(&self, message: Message) {
        let _ = self.event_bus.message_added.send(Arc::new(message));
    }

    pub(crate) fn emit_message_updated(&self, message: Message) {
        let _ = self.event_bus.message_updated.send(Arc::new(message));
    }

    pub(crate) fn emit_chat_presence(&self, update: ChatPresenceUpdate) {
        let _ = self.event_bus.chat_presence.send(Arc::new(update));
    }
}
