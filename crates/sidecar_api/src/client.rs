use chat_transcript::Fragment;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::SidecarApiConfig;
use crate::error::SidecarApiError;
use crate::payload::{Acknowledgement, ChatRequest, ConfirmRequest};
use crate::settings::Settings;
use crate::sse::{SseFrameParser, SseItem};
use crate::url::endpoint_url;

const EVENT_STREAM: &str = "text/event-stream";

/// How a `/chat` stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStreamEnd {
    /// The sidecar sent the `[DONE]` sentinel.
    Done,
    /// The connection closed without a sentinel.
    Eof,
}

#[derive(Debug, Clone)]
pub struct SidecarClient {
    http: Client,
    config: SidecarApiConfig,
}

impl SidecarClient {
    pub fn new(config: SidecarApiConfig) -> Result<Self, SidecarApiError> {
        endpoint_url(&config.base_url, "")?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(SidecarApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SidecarApiConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, SidecarApiError> {
        endpoint_url(&self.config.base_url, path)
    }

    pub fn build_chat_request(&self, message: &str) -> Result<RequestBuilder, SidecarApiError> {
        Ok(self
            .http
            .post(self.endpoint("chat")?)
            .header(ACCEPT, EVENT_STREAM)
            .json(&ChatRequest::new(message)))
    }

    pub fn build_confirm_request(&self, approved: bool) -> Result<RequestBuilder, SidecarApiError> {
        Ok(self
            .http
            .post(self.endpoint("confirm")?)
            .json(&ConfirmRequest { approved }))
    }

    pub fn build_reset_request(&self) -> Result<RequestBuilder, SidecarApiError> {
        Ok(self.http.post(self.endpoint("reset")?))
    }

    /// Sends `message` and hands every decoded fragment to `on_fragment` in
    /// stream order. Resolves when the sidecar signals the end of the turn
    /// or closes the connection.
    pub async fn stream_chat<F>(
        &self,
        message: &str,
        mut on_fragment: F,
    ) -> Result<ChatStreamEnd, SidecarApiError>
    where
        F: FnMut(Fragment),
    {
        let response = self.build_chat_request(message)?.send().await?;
        let response = ensure_success(response).await?;
        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            debug!(content_type = ?content_type, "sidecar chat stream opened");
        }

        let mut bytes = response.bytes_stream();
        let mut parser = SseFrameParser::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            if dispatch_items(parser.feed(&chunk), &mut on_fragment) {
                return Ok(ChatStreamEnd::Done);
            }
        }

        if dispatch_items(parser.finish(), &mut on_fragment) {
            return Ok(ChatStreamEnd::Done);
        }

        debug!("sidecar chat stream closed without sentinel");
        Ok(ChatStreamEnd::Eof)
    }

    pub async fn confirm(&self, approved: bool) -> Result<Acknowledgement, SidecarApiError> {
        let response = self.build_confirm_request(approved)?.send().await?;
        read_acknowledgement(response).await
    }

    pub async fn reset(&self) -> Result<Acknowledgement, SidecarApiError> {
        let response = self.build_reset_request()?.send().await?;
        read_acknowledgement(response).await
    }

    /// Succeeds when `GET /health` answers with a success status.
    pub async fn health_check(&self) -> Result<(), SidecarApiError> {
        let response = self.http.get(self.endpoint("health")?).send().await?;
        ensure_success(response).await.map(|_| ())
    }

    pub async fn is_healthy(&self) -> bool {
        self.health_check().await.is_ok()
    }

    pub async fn settings(&self) -> Result<Settings, SidecarApiError> {
        let response = self.http.get(self.endpoint("settings")?).send().await?;
        decode_json(response).await
    }

    pub async fn update_settings(
        &self,
        settings: &Settings,
    ) -> Result<Acknowledgement, SidecarApiError> {
        let response = self
            .http
            .post(self.endpoint("settings")?)
            .json(settings)
            .send()
            .await?;
        read_acknowledgement(response).await
    }
}

/// Forwards fragments and reports whether the end sentinel was reached.
/// Items after the sentinel are dropped.
fn dispatch_items<F>(items: Vec<SseItem>, on_fragment: &mut F) -> bool
where
    F: FnMut(Fragment),
{
    for item in items {
        match item {
            SseItem::Fragment(fragment) => on_fragment(fragment),
            SseItem::Done => return true,
        }
    }
    false
}

async fn ensure_success(response: Response) -> Result<Response, SidecarApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SidecarApiError::status(status, &body))
}

async fn decode_json<T>(response: Response) -> Result<T, SidecarApiError>
where
    T: DeserializeOwned,
{
    let body = ensure_success(response).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

async fn read_acknowledgement(response: Response) -> Result<Acknowledgement, SidecarApiError> {
    let body = ensure_success(response).await?.text().await?;
    if body.trim().is_empty() {
        return Ok(Acknowledgement::default());
    }
    Ok(serde_json::from_str(&body)?)
}
