//! Shared test support: scripted HTTP clients and a mock transport.
//!
//! Kept as a normal module (not `#[cfg(test)]`) so the integration tests
//! under `tests/` can drive a fully wired client without a broker or a
//! backend.

use crate::client::Client;
use crate::config::ClientConfig;
use crate::net::{
    HttpClient, HttpRequest, HttpResponse, Transport, TransportEvent, TransportFactory,
};
use crate::types::channel::Channel;
use crate::types::events::PubSubFrame;
use crate::types::message::{Message, MessageBody, MessageStatus};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A server-confirmed message for seeding stores and pages in tests.
pub fn server_message(channel: &Channel, id: &str, sender: &str, text: &str) -> Message {
    let mut message = Message::pending(
        format!("cid-{id}"),
        channel.clone(),
        sender.to_string(),
        sender.to_string(),
        MessageBody::text(text),
    );
    message.id = id.to_string();
    message.status = MessageStatus::Sent;
    message
}

/// HTTP client that plays the backend's happy path: message posts are
/// echoed back as server records, history fetches pop pre-queued pages,
/// everything else returns 204. All requests are recorded.
#[derive(Debug, Default)]
pub struct EchoHttpClient {
    counter: AtomicU64,
    pages: Mutex<VecDeque<Vec<Message>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl EchoHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a history page; each `GET .../messages` pops one.
    pub fn push_page(&self, page: Vec<Message>) {
        self.pages.lock().unwrap().push_back(page);
    }

    pub fn request_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }

    fn echo_message(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let payload: serde_json::Value =
            serde_json::from_slice(request.body.as_deref().unwrap_or(b"{}"))?;
        let channel = channel_from_url(&request.url)
            .ok_or_else(|| anyhow::anyhow!("No channel in url {}", request.url))?;
        let n = self.counter.fetch_add(1, Ordering::Relaxed);

        let message = serde_json::json!({
            "id": format!("srv-{n}"),
            "client_id": payload["client_id"],
            "channel": channel,
            "sender": "me",
            "sender_name": "Me",
            "body": payload["body"],
            "created_at": chrono::Utc::now().to_rfc3339(),
        });
        Ok(HttpResponse {
            status_code: 200,
            body: serde_json::to_vec(&message)?,
        })
    }
}

#[async_trait]
impl HttpClient for EchoHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if request.method == "POST" && request.url.ends_with("/messages") {
            return self.echo_message(&request);
        }
        if request.method == "GET" && request.url.contains("/messages") {
            let page = self.pages.lock().unwrap().pop_front().unwrap_or_default();
            return Ok(HttpResponse {
                status_code: 200,
                body: serde_json::to_vec(&serde_json::json!({ "messages": page }))?,
            });
        }
        Ok(HttpResponse {
            status_code: 204,
            body: Vec::new(),
        })
    }
}

/// HTTP client where every request fails, either at the transport level
/// (default) or with a scripted error status.
#[derive(Debug, Clone, Default)]
pub struct FailingHttpClient {
    status: Option<(u16, String)>,
}

impl FailingHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(status: u16, body: &str) -> Self {
        Self {
            status: Some((status, body.to_string())),
        }
    }
}

#[async_trait]
impl HttpClient for FailingHttpClient {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
        match &self.status {
            Some((status_code, body)) => Ok(HttpResponse {
                status_code: *status_code,
                body: body.clone().into_bytes(),
            }),
            None => Err(anyhow::anyhow!("connection refused")),
        }
    }
}

/// HTTP client that records every request and answers 204.
#[derive(Debug, Default)]
pub struct RecordingHttpClient {
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for RecordingHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(HttpResponse {
            status_code: 204,
            body: Vec::new(),
        })
    }
}

fn channel_from_url(url: &str) -> Option<serde_json::Value> {
    let rest = url.split("/v1/").nth(1)?;
    let mut segments = rest.split('/');
    let kind = match segments.next()? {
        "communities" => "community",
        "subgroups" => "subgroup",
        _ => return None,
    };
    let id = segments.next()?;
    Some(serde_json::json!({"kind": kind, "id": id}))
}

/// A transport that records published frames and never delivers anything
/// on its own; tests inject incoming events through the factory.
#[derive(Debug, Default)]
pub struct MockTransport {
    published: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub fn published_frames(&self) -> Vec<PubSubFrame> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter_map(|bytes| serde_json::from_slice(bytes).ok())
            .collect()
    }

    /// The chatstate transitions published so far, in order.
    pub fn published_chatstates(&self) -> Vec<String> {
        self.published_frames()
            .into_iter()
            .filter(|f| f.event == "chatstate")
            .filter_map(|f| f.payload["state"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn publish(&self, frame: &[u8]) -> Result<(), anyhow::Error> {
        self.published.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    async fn disconnect(&self) {}
}

/// Factory handing out a shared [`MockTransport`] and exposing the event
/// channel so tests can feed frames into the pump.
#[derive(Default)]
pub struct MockTransportFactory {
    transport: Arc<MockTransport>,
    event_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Arc<MockTransport> {
        self.transport.clone()
    }

    fn sender(&self) -> mpsc::Sender<TransportEvent> {
        self.event_tx
            .lock()
            .unwrap()
            .clone()
            .expect("create_transport was never called")
    }

    /// Delivers a frame as if the broker had fanned it out.
    pub async fn inject_frame(&self, frame: &PubSubFrame) {
        let bytes = serde_json::to_vec(frame).expect("frame serializes");
        self.sender()
            .send(TransportEvent::FrameReceived(Bytes::from(bytes)))
            .await
            .expect("pump is running");
    }

    /// Simulates the broker dropping the connection.
    pub async fn inject_disconnect(&self) {
        self.sender()
            .send(TransportEvent::Disconnected)
            .await
            .expect("pump is running");
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        let (event_tx, event_rx) = mpsc::channel(100);
        *self.event_tx.lock().unwrap() = Some(event_tx.clone());
        let _ = event_tx.try_send(TransportEvent::Connected);
        Ok((self.transport.clone(), event_rx))
    }
}

pub struct TestClientHandles {
    pub client: Arc<Client>,
    pub factory: Arc<MockTransportFactory>,
    pub http: Arc<EchoHttpClient>,
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        api_base_url: "https://api.test".to_string(),
        pubsub_url: "ws://broker.test/pubsub".to_string(),
        tenant_id: "testtenant".to_string(),
        auth_token: "test-token".to_string(),
        member_id: "me".to_string(),
        display_name: "Me".to_string(),
        ..Default::default()
    }
}

/// A client wired to the happy-path backend and a mock transport.
pub fn create_test_client() -> Arc<Client> {
    create_wired_test_client().client
}

/// Like [`create_test_client`], keeping hold of the mocks for inspection.
pub fn create_wired_test_client() -> TestClientHandles {
    let http = Arc::new(EchoHttpClient::new());
    let factory = Arc::new(MockTransportFactory::new());
    let client = Client::new(test_config(), http.clone(), factory.clone());
    TestClientHandles {
        client,
        factory,
        http,
    }
}

/// A client whose backend refuses every request.
pub fn create_failing_test_client() -> Arc<Client> {
    let factory = Arc::new(MockTransportFactory::new());
    Client::new(
        test_config(),
        Arc::new(FailingHttpClient::new()),
        factory,
    )
}
