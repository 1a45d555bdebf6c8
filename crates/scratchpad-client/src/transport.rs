use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use scratchpad_core::heartbeat::{
    Fields, NonceResponse, ResourceResponse, SaveRequest, SaveResponse,
};
use scratchpad_core::ResourceKey;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::ClientError;

/// The channel a controller talks to the server through.
///
/// Heartbeats carry the flat field map of every resource polled in that tick.
#[async_trait]
pub trait Transport: Send + Sync {
    /// One poll round trip.
    async fn heartbeat(&self, fields: Fields) -> Result<Fields, ClientError>;

    /// Current document for `key`.
    async fn load(&self, key: &ResourceKey) -> Result<ResourceResponse, ClientError>;

    /// A save nonce for `key`.
    async fn nonce(&self, key: &ResourceKey) -> Result<String, ClientError>;

    /// Submit a save. A lock rejection is `Ok` with `success == false`.
    async fn save(
        &self,
        key: &ResourceKey,
        request: &SaveRequest,
    ) -> Result<SaveResponse, ClientError>;
}

/// Error body returned by the server.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Transport over the server's HTTP API, authenticated with a bearer token.
pub struct HttpTransport {
    http_client: HttpClient,
    base_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn status_error(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);
        ClientError::Status { status, message }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, outgoing), level = "debug", fields(field_count = outgoing.len()))]
    async fn heartbeat(&self, outgoing: Fields) -> Result<Fields, ClientError> {
        let response = self
            .http_client
            .post(self.url("/heartbeat"))
            .bearer_auth(&self.token)
            .json(&outgoing)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let reply: Fields = response.json().await?;
        debug!("Heartbeat reply with {} fields", reply.len());
        Ok(reply)
    }

    #[instrument(skip(self), level = "debug")]
    async fn load(&self, key: &ResourceKey) -> Result<ResourceResponse, ClientError> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/resources/{}", key)))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        Ok(response.json().await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn nonce(&self, key: &ResourceKey) -> Result<String, ClientError> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/resources/{}/nonce", key)))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        let body: NonceResponse = response.json().await?;
        Ok(body.nonce)
    }

    #[instrument(skip(self, request), level = "debug", fields(content_len = request.content.len()))]
    async fn save(
        &self,
        key: &ResourceKey,
        request: &SaveRequest,
    ) -> Result<SaveResponse, ClientError> {
        let response = self
            .http_client
            .post(self.url(&format!("/api/resources/{}/save", key)))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::CONFLICT | StatusCode::PAYLOAD_TOO_LARGE => {
                let body: ErrorBody = response.json().await?;
                Ok(SaveResponse {
                    success: false,
                    message: Some(body.message),
                })
            }
            _ => Err(Self::status_error(response).await),
        }
    }
}
