//! Content store over a ranked list of gateways
//!
//! Uploads go through a single endpoint under the configured retry policy.
//! Downloads walk the gateway list in rank order; the first gateway that answers
//! with a body of the expected length wins. Each request is bounded by the
//! per-gateway timeout and the whole walk by the fetch deadline.

use capsule_core::effects::{ContentGateway, ContentUploader, GatewayAttempt, GatewayFailure};
use capsule_core::reliability::AttemptError;
use capsule_core::{CapsuleError, ContentId, Result, StorageOperation, StoreConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Bytes returned by a gateway together with the diagnostics of the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    /// Content bytes as served
    pub bytes: Vec<u8>,
    /// Gateway that served them
    pub gateway: String,
    /// Gateways that failed before the winning one
    pub failed_attempts: Vec<GatewayAttempt>,
}

/// Client for a content-addressed storage network
pub struct ContentStore {
    uploader: Option<Arc<dyn ContentUploader>>,
    gateways: RwLock<Vec<Arc<dyn ContentGateway>>>,
    known_sizes: RwLock<HashMap<ContentId, u64>>,
    config: StoreConfig,
}

impl ContentStore {
    /// Create a store with an upload endpoint and a ranked gateway list
    pub fn new(
        config: StoreConfig,
        uploader: Option<Arc<dyn ContentUploader>>,
        gateways: Vec<Arc<dyn ContentGateway>>,
    ) -> Self {
        Self {
            uploader,
            gateways: RwLock::new(gateways),
            known_sizes: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Replace the ranked gateway list
    pub fn set_gateways(&self, gateways: Vec<Arc<dyn ContentGateway>>) {
        info!(count = gateways.len(), "Replacing gateway list");
        *self.gateways.write() = gateways;
    }

    /// Append a gateway at the lowest rank
    pub fn add_gateway(&self, gateway: Arc<dyn ContentGateway>) {
        debug!(gateway = %gateway.endpoint(), "Adding gateway");
        self.gateways.write().push(gateway);
    }

    /// Endpoints in rank order
    pub fn gateway_endpoints(&self) -> Vec<String> {
        self.gateways
            .read()
            .iter()
            .map(|g| g.endpoint().to_string())
            .collect()
    }

    /// Size recorded for an identifier at upload time
    pub fn known_size(&self, id: &ContentId) -> Option<u64> {
        self.known_sizes.read().get(id).copied()
    }

    /// Upload bytes and return their content identifier
    pub async fn put(&self, data: &[u8]) -> Result<ContentId> {
        let uploader = self
            .uploader
            .as_ref()
            .ok_or_else(|| CapsuleError::invalid("no upload endpoint configured"))?;
        let expected = ContentId::for_bytes(data);
        let endpoint = uploader.endpoint().to_string();

        debug!(endpoint = %endpoint, bytes = data.len(), content_id = %expected, "Uploading content");

        let outcome = self
            .config
            .upload_retry
            .execute_with_context(|attempt| {
                if attempt > 0 {
                    debug!(endpoint = %endpoint, attempt, "Retrying upload");
                }
                uploader.upload(data)
            })
            .await;

        let assigned = match outcome.result {
            Ok(id) => id,
            Err(()) => {
                let attempts = outcome
                    .failures
                    .into_iter()
                    .map(|failure| {
                        let failure = match failure {
                            AttemptError::Failed(f) => f,
                            AttemptError::TimedOut(limit) => GatewayFailure::Timeout {
                                timeout_ms: limit.as_millis() as u64,
                            },
                        };
                        GatewayAttempt::new(endpoint.clone(), failure)
                    })
                    .collect::<Vec<_>>();
                warn!(endpoint = %endpoint, attempts = attempts.len(), "Upload budget exhausted");
                return Err(CapsuleError::StorageUnavailable {
                    operation: StorageOperation::Upload,
                    attempts,
                });
            }
        };

        if assigned != expected {
            warn!(endpoint = %endpoint, expected = %expected, assigned = %assigned, "Upload endpoint assigned a foreign identifier");
            return Err(CapsuleError::IntegrityViolation {
                content_id: assigned.to_string(),
                expected: expected.to_string(),
                actual: assigned.to_string(),
                endpoint: Some(endpoint),
            });
        }

        self.known_sizes
            .write()
            .insert(expected, data.len() as u64);
        info!(content_id = %expected, bytes = data.len(), "Content stored");
        Ok(expected)
    }

    /// Fetch bytes for an identifier through the gateway chain
    pub async fn get(&self, id: &ContentId) -> Result<Vec<u8>> {
        self.fetch(id, None).await.map(|fetched| fetched.bytes)
    }

    /// Fetch with an explicit size hint; falls back to the size recorded at upload
    pub async fn fetch(&self, id: &ContentId, size_hint: Option<u64>) -> Result<FetchedContent> {
        let expected_size = size_hint.or_else(|| self.known_size(id));
        let gateways: Vec<Arc<dyn ContentGateway>> = self.gateways.read().clone();
        let per_gateway = self.config.gateway_timeout();
        let deadline = Instant::now() + self.config.fetch_deadline();
        let mut attempts = Vec::with_capacity(gateways.len());

        for gateway in &gateways {
            let endpoint = gateway.endpoint().to_string();
            let now = Instant::now();
            if now >= deadline {
                attempts.push(GatewayAttempt::new(endpoint, GatewayFailure::DeadlineExceeded));
                continue;
            }
            let budget = per_gateway.min(deadline - now);

            let failure = match tokio::time::timeout(budget, gateway.fetch(id)).await {
                Ok(Ok(bytes)) => match expected_size {
                    Some(expected) if bytes.len() as u64 != expected => {
                        GatewayFailure::SizeMismatch {
                            expected,
                            actual: bytes.len() as u64,
                        }
                    }
                    _ => {
                        debug!(content_id = %id, gateway = %endpoint, bytes = bytes.len(), "Gateway served content");
                        return Ok(FetchedContent {
                            bytes,
                            gateway: endpoint,
                            failed_attempts: attempts,
                        });
                    }
                },
                Ok(Err(failure)) => failure,
                Err(_) => GatewayFailure::Timeout {
                    timeout_ms: duration_ms(budget),
                },
            };

            warn!(content_id = %id, gateway = %endpoint, failure = %failure, "Gateway attempt failed");
            attempts.push(GatewayAttempt::new(endpoint, failure));
        }

        Err(Self::exhausted(id, attempts))
    }

    /// Recompute the content hash and compare with the identifier
    pub fn verify(&self, id: &ContentId, bytes: &[u8]) -> bool {
        id.verify(bytes)
    }

    /// Fetch and verify; a hash mismatch is an `IntegrityViolation` naming the gateway
    pub async fn fetch_verified(
        &self,
        id: &ContentId,
        size_hint: Option<u64>,
    ) -> Result<FetchedContent> {
        let fetched = self.fetch(id, size_hint).await?;
        if !self.verify(id, &fetched.bytes) {
            let actual = ContentId::for_bytes(&fetched.bytes);
            warn!(content_id = %id, gateway = %fetched.gateway, actual = %actual, "Gateway served tampered content");
            return Err(CapsuleError::IntegrityViolation {
                content_id: id.to_string(),
                expected: hex::encode(id.digest()),
                actual: hex::encode(actual.digest()),
                endpoint: Some(fetched.gateway),
            });
        }
        Ok(fetched)
    }

    fn exhausted(id: &ContentId, attempts: Vec<GatewayAttempt>) -> CapsuleError {
        let unavailable =
            attempts.is_empty() || attempts.iter().any(|a| a.failure.is_unavailability());
        if unavailable {
            warn!(content_id = %id, attempts = attempts.len(), "All gateways unavailable");
            CapsuleError::StorageUnavailable {
                operation: StorageOperation::Fetch,
                attempts,
            }
        } else {
            warn!(content_id = %id, attempts = attempts.len(), "No gateway could serve content");
            CapsuleError::ContentNotRetrievable {
                content_id: id.to_string(),
                attempts,
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("uploader", &self.uploader.as_ref().map(|u| u.endpoint().to_string()))
            .field("gateways", &self.gateway_endpoints())
            .finish()
    }
}
