//! External time source over HTTP
//!
//! Expects a JSON body carrying Unix seconds in a `unixtime` field, the shape
//! served by common public time APIs.

use async_trait::async_trait;
use capsule_core::effects::{SourceKind, TimeSourceEffects, TimeSourceError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TimeResponse {
    unixtime: u64,
}

/// External reference clock reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpTimeSource {
    url: String,
    client: reqwest::Client,
}

impl HttpTimeSource {
    /// Query through a shared client; the caller bounds each query
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl TimeSourceEffects for HttpTimeSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> SourceKind {
        SourceKind::External
    }

    async fn now(&self) -> Result<u64, TimeSourceError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                TimeSourceError::Timeout { timeout_ms: 0 }
            } else {
                TimeSourceError::Unavailable {
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(TimeSourceError::Unavailable {
                reason: format!("status {}", response.status()),
            });
        }

        let body: TimeResponse =
            response
                .json()
                .await
                .map_err(|e| TimeSourceError::Malformed {
                    reason: e.to_string(),
                })?;
        Ok(body.unixtime)
    }
}
