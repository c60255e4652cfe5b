//! Typed wrapper around the backend REST API.
//!
//! The backend is an opaque collaborator: request shape in, JSON out, errors
//! carried as an HTTP status plus a `detail` field. Everything here goes
//! through the [`HttpClient`] seam so tests can script responses.

use crate::config::ClientConfig;
use crate::net::{HttpClient, HttpRequest, HttpResponse};
use crate::types::channel::Channel;
use crate::types::message::{ClientMessageId, Message, MessageBody, MessageId};
use crate::types::presence::ReceiptKind;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("backend returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("http transport error: {0}")]
    Transport(anyhow::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Error body shape used by the backend for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: String,
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    client_id: &'a str,
    body: &'a MessageBody,
}

#[derive(Debug, Serialize)]
struct EditMessagePayload<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ReceiptPayload<'a> {
    message_id: &'a str,
    kind: ReceiptKind,
}

#[derive(Clone)]
pub struct ChatApi {
    http: Arc<dyn HttpClient>,
    config: Arc<ClientConfig>,
}

impl ChatApi {
    pub fn new(http: Arc<dyn HttpClient>, config: Arc<ClientConfig>) -> Self {
        Self { http, config }
    }

    fn url(&self, channel: &Channel, suffix: &str) -> String {
        let base = self.config.api_base_url.trim_end_matches('/');
        format!("{}/v1/{}{}", base, channel.api_path(), suffix)
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        request
            .with_header("Authorization", format!("Bearer {}", self.config.auth_token))
            .with_header("X-Tenant-Id", self.config.tenant_id.clone())
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(target: "Api", "{} {}", request.method, request.url);
        let response = self
            .http
            .execute(self.authorize(request))
            .await
            .map_err(ApiError::Transport)?;

        if response.is_success() {
            return Ok(response);
        }

        let detail = serde_json::from_slice::<ErrorDetail>(&response.body)
            .map(|e| e.detail)
            .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).into_owned());
        Err(ApiError::Status {
            status: response.status_code,
            detail,
        })
    }

    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Fetches one page of a channel's history, newest first. `before`
    /// pages backwards from an already loaded message.
    pub async fn fetch_messages(
        &self,
        channel: &Channel,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<Message>, ApiError> {
        let mut url = format!("{}?limit={}", self.url(channel, "/messages"), limit);
        if let Some(before) = before {
            url.push_str("&before=");
            url.push_str(&urlencoding::encode(before));
        }
        let page: MessagesPage = self.execute_json(HttpRequest::get(url)).await?;
        Ok(page.messages)
    }

    /// Submits a new message and returns the server-confirmed record. The
    /// correlation id travels with the request so the echo can be matched
    /// back to the optimistic entry.
    pub async fn send_message(
        &self,
        channel: &Channel,
        client_id: &ClientMessageId,
        body: &MessageBody,
    ) -> Result<Message, ApiError> {
        let request = HttpRequest::post(self.url(channel, "/messages"))
            .with_json(&SendMessagePayload { client_id, body })?;
        self.execute_json(request).await
    }

    pub async fn edit_message(
        &self,
        channel: &Channel,
        message_id: &MessageId,
        text: &str,
    ) -> Result<(), ApiError> {
        let request = HttpRequest::put(self.url(channel, &format!("/messages/{message_id}")))
            .with_json(&EditMessagePayload { text })?;
        self.execute(request).await.map(drop)
    }

    pub async fn delete_message(
        &self,
        channel: &Channel,
        message_id: &MessageId,
    ) -> Result<(), ApiError> {
        let request = HttpRequest::delete(self.url(channel, &format!("/messages/{message_id}")));
        self.execute(request).await.map(drop)
    }

    pub async fn add_reaction(
        &self,
        channel: &Channel,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<(), ApiError> {
        let request = HttpRequest::put(self.reaction_url(channel, message_id, emoji));
        self.execute(request).await.map(drop)
    }

    pub async fn remove_reaction(
        &self,
        channel: &Channel,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<(), ApiError> {
        let request = HttpRequest::delete(self.reaction_url(channel, message_id, emoji));
        self.execute(request).await.map(drop)
    }

    pub async fn star_message(
        &self,
        channel: &Channel,
        message_id: &MessageId,
    ) -> Result<(), ApiError> {
        let request = HttpRequest::put(self.url(channel, &format!("/messages/{message_id}/star")));
        self.execute(request).await.map(drop)
    }

    pub async fn unstar_message(
        &self,
        channel: &Channel,
        message_id: &MessageId,
    ) -> Result<(), ApiError> {
        let request =
            HttpRequest::delete(self.url(channel, &format!("/messages/{message_id}/star")));
        self.execute(request).await.map(drop)
    }

    pub async fn send_receipt(
        &self,
        channel: &Channel,
        message_id: &MessageId,
        kind: ReceiptKind,
    ) -> Result<(), ApiError> {
        let request = HttpRequest::post(self.url(channel, "/receipts"))
            .with_json(&ReceiptPayload { message_id, kind })?;
        self.execute(request).await.map(drop)
    }

    fn reaction_url(&self, channel: &Channel, message_id: &MessageId, emoji: &str) -> String {
        self.url(
            channel,
            &format!("/messages/{}/reactions/{}", message_id, urlencoding::encode(emoji)),
        )
    }
}
