use std::time::Duration;

/// Static configuration handed to the client by the embedding application.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the REST backend, without the `/v1` prefix.
    pub api_base_url: String,
    /// WebSocket URL of the pub/sub broker.
    pub pubsub_url: String,
    /// Tenant the session belongs to; sent as `X-Tenant-Id` on every request.
    pub tenant_id: String,
    /// Bearer token for the authenticated member.
    pub auth_token: String,
    /// Member id of the viewer; used as the sender reference on optimistic
    /// entries and to tell own messages apart in the read-receipt aggregator.
    pub member_id: String,
    /// Display name attached to outgoing typing signals.
    pub display_name: String,
    /// Minimum gap between two outgoing composing signals per channel.
    pub typing_debounce: Duration,
    /// Trailing window after the last keystroke before a paused signal is
    /// published; remote composing entries expire after the same window.
    pub typing_timeout: Duration,
    /// Page size for message history fetches.
    pub page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            pubsub_url: "ws://localhost:8081/pubsub".to_string(),
            tenant_id: "dev".to_string(),
            auth_token: String::new(),
            member_id: String::new(),
            display_name: String::new(),
            typing_debounce: Duration::from_secs(2),
            typing_timeout: Duration::from_secs(5),
            page_size: 50,
        }
    }
}
