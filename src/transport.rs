//! WebSocket implementation of the pub/sub transport seam.
//!
//! The broker speaks JSON frames over a single socket; this module is a dumb
//! pipe that moves those frames and reports connection state. Topic routing
//! lives in the handler layer.

use crate::net::{Transport, TransportEvent, TransportFactory};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, trace, warn};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<RawWs, Message>;
type WsStream = SplitStream<RawWs>;

const EVENT_CHANNEL_CAPACITY: usize = 100;

pub struct WebSocketTransport {
    ws_sink: Arc<Mutex<Option<WsSink>>>,
}

impl WebSocketTransport {
    fn new(sink: WsSink) -> Self {
        Self {
            ws_sink: Arc::new(Mutex::new(Some(sink))),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn publish(&self, frame: &[u8]) -> Result<(), anyhow::Error> {
        let mut sink_guard = self.ws_sink.lock().await;
        let sink = sink_guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Socket is closed"))?;

        // All frames this crate produces are JSON.
        let text = String::from_utf8(frame.to_vec())
            .map_err(|e| anyhow::anyhow!("Frame is not valid UTF-8: {e}"))?;

        debug!(target: "Transport", "--> Publishing frame: {} bytes", frame.len());
        sink.send(Message::text(text))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send error: {e}"))?;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut sink_guard = self.ws_sink.lock().await;
        if let Some(mut sink) = sink_guard.take() {
            if let Err(e) = sink.close().await {
                debug!(target: "Transport", "Error closing websocket: {e}");
            }
        }
    }
}

/// Factory dialing the broker URL from the client configuration.
pub struct WebSocketTransportFactory {
    url: String,
}

impl WebSocketTransportFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl TransportFactory for WebSocketTransportFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        log::info!(target: "Transport", "Dialing {}", self.url);
        let (ws, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {e}"))?;

        let (sink, stream) = ws.split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let transport = Arc::new(WebSocketTransport::new(sink));

        tokio::task::spawn(read_pump(stream, event_tx.clone()));

        let _ = event_tx.send(TransportEvent::Connected).await;

        Ok((transport, event_rx))
    }
}

async fn read_pump(mut stream: WsStream, event_tx: mpsc::Sender<TransportEvent>) {
    loop {
        match stream.next().await {
            Some(Ok(msg)) => {
                if msg.is_text() || msg.is_binary() {
                    let data = msg.into_data();
                    trace!(target: "Transport", "<-- Received frame: {} bytes", data.len());
                    if event_tx
                        .send(TransportEvent::FrameReceived(data))
                        .await
                        .is_err()
                    {
                        warn!(target: "Transport", "Event receiver dropped, closing read pump");
                        break;
                    }
                } else if msg.is_close() {
                    trace!(target: "Transport", "Received close frame");
                    break;
                }
            }
            Some(Err(e)) => {
                error!(target: "Transport", "Error reading from websocket: {e}");
                break;
            }
            None => {
                trace!(target: "Transport", "Websocket stream ended");
                break;
            }
        }
    }

    let _ = event_tx.send(TransportEvent::Disconnected).await;
}
