//! HTTP gateway and upload handlers
//!
//! Gateways serve `GET {base}/content/{cid}`. The upload endpoint accepts
//! `POST {base}/content` with the raw bytes and answers `{"cid": "..."}`.

use async_trait::async_trait;
use capsule_core::effects::{ContentGateway, ContentUploader, GatewayFailure};
use capsule_core::ContentId;
use serde::Deserialize;
use tracing::debug;

fn classify_status(status: reqwest::StatusCode) -> GatewayFailure {
    if status == reqwest::StatusCode::NOT_FOUND {
        GatewayFailure::NotFound
    } else if status.is_server_error() {
        GatewayFailure::unavailable(format!("server error {status}"))
    } else {
        GatewayFailure::Rejected {
            status: status.as_u16(),
        }
    }
}

fn classify_transport(err: reqwest::Error) -> GatewayFailure {
    GatewayFailure::unavailable(err.to_string())
}

fn trim_base(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Read-only HTTP gateway
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Share a client between gateways
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: trim_base(base_url),
            client,
        }
    }
}

#[async_trait]
impl ContentGateway for HttpGateway {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, id: &ContentId) -> Result<Vec<u8>, GatewayFailure> {
        let url = format!("{}/content/{id}", self.base_url);
        debug!(url = %url, "Gateway fetch");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let body = response.bytes().await.map_err(classify_transport)?;
        Ok(body.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    cid: String,
}

/// HTTP upload endpoint
#[derive(Debug, Clone)]
pub struct HttpUploader {
    base_url: String,
    client: reqwest::Client,
}

impl HttpUploader {
    /// Upload through a shared client
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: trim_base(base_url),
            client,
        }
    }
}

#[async_trait]
impl ContentUploader for HttpUploader {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn upload(&self, data: &[u8]) -> Result<ContentId, GatewayFailure> {
        let url = format!("{}/content", self.base_url);
        debug!(url = %url, bytes = data.len(), "Uploading");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| GatewayFailure::unavailable(format!("malformed upload response: {e}")))?;

        parsed
            .cid
            .parse()
            .map_err(|e| GatewayFailure::unavailable(format!("malformed content id: {e}")))
    }
}
