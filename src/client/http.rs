//! HTTP implementation of [`LiveBackend`] against the Aegis REST API

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::Value;

use super::credentials::CredentialStore;
use super::{ClientError, LiveBackend, RawBatch};

const RECORDING_PATH: &[&str] = &["api", "live-response", "recording"];
const RECENT_EVENTS_PATH: &[&str] = &["api", "events", "recent"];

/// REST client for the live-response recording endpoints
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpBackend {
    /// Create a backend client rooted at `base_url`
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(HttpBackend {
            client,
            base,
            credentials,
        })
    }

    fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn recording_endpoint(&self, tail: &[&str]) -> Result<Url, ClientError> {
        let segments: Vec<&str> = RECORDING_PATH.iter().chain(tail.iter()).copied().collect();
        self.endpoint(&segments)
    }

    /// Attach the bearer token, send, and decode the JSON body
    ///
    /// A missing token fails before anything goes on the wire.
    async fn send_json(&self, request: RequestBuilder) -> Result<Value, ClientError> {
        let token = self.credentials.token().ok_or(ClientError::Unauthorized)?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn session_id_from(value: &Value) -> Option<String> {
        ["session_id", "sessionId", "id"]
            .iter()
            .filter_map(|key| value.get(*key))
            .find_map(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

#[async_trait]
impl LiveBackend for HttpBackend {
    async fn start_recording(&self) -> Result<String, ClientError> {
        let url = self.recording_endpoint(&["start"])?;
        let body = self.send_json(self.client.post(url)).await?;
        let session_id = Self::session_id_from(&body).ok_or(ClientError::MissingSessionId)?;
        log::info!("Recording session {} started", session_id);
        Ok(session_id)
    }

    async fn fetch_live_batch(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<RawBatch, ClientError> {
        let url = self.recording_endpoint(&[session_id, "events"])?;
        let request = self.client.get(url).query(&[("limit", limit)]);
        let body = self.send_json(request).await?;
        Ok(RawBatch::from_value(body))
    }

    async fn stop_recording(&self, session_id: &str) -> Result<(), ClientError> {
        let url = self.recording_endpoint(&[session_id, "stop"])?;
        self.send_json(self.client.post(url)).await?;
        log::info!("Recording session {} stopped", session_id);
        Ok(())
    }

    async fn fetch_recent_events(&self, limit: usize) -> Result<Vec<Value>, ClientError> {
        let url = self.endpoint(RECENT_EVENTS_PATH)?;
        let request = self.client.get(url).query(&[("limit", limit)]);
        let body = self.send_json(request).await?;
        Ok(RawBatch::from_value(body).events)
    }
}
