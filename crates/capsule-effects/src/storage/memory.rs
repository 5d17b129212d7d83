//! In-memory content network
//!
//! A single blob map shared by any number of gateway and uploader views. Used
//! by local deployments and by tests that need a network which always answers.

use async_trait::async_trait;
use capsule_core::effects::{ContentGateway, ContentUploader, GatewayFailure};
use capsule_core::ContentId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared blob map addressed by content hash
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    blobs: Arc<RwLock<HashMap<ContentId, Vec<u8>>>>,
}

impl MemoryNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway view with the given endpoint name
    pub fn gateway(&self, endpoint: impl Into<String>) -> MemoryGateway {
        MemoryGateway {
            endpoint: endpoint.into(),
            network: self.clone(),
        }
    }

    /// Uploader view with the given endpoint name
    pub fn uploader(&self, endpoint: impl Into<String>) -> MemoryUploader {
        MemoryUploader {
            endpoint: endpoint.into(),
            network: self.clone(),
        }
    }

    /// Store bytes under an arbitrary identifier
    pub fn insert_raw(&self, id: ContentId, bytes: Vec<u8>) {
        self.blobs.write().insert(id, bytes);
    }

    /// Whether the network holds an identifier
    pub fn contains(&self, id: &ContentId) -> bool {
        self.blobs.read().contains_key(id)
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

/// Read view over a [`MemoryNetwork`]
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    endpoint: String,
    network: MemoryNetwork,
}

#[async_trait]
impl ContentGateway for MemoryGateway {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, id: &ContentId) -> Result<Vec<u8>, GatewayFailure> {
        self.network
            .blobs
            .read()
            .get(id)
            .cloned()
            .ok_or(GatewayFailure::NotFound)
    }
}

/// Write view over a [`MemoryNetwork`]
#[derive(Debug, Clone)]
pub struct MemoryUploader {
    endpoint: String,
    network: MemoryNetwork,
}

#[async_trait]
impl ContentUploader for MemoryUploader {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn upload(&self, data: &[u8]) -> Result<ContentId, GatewayFailure> {
        let id = ContentId::for_bytes(data);
        self.network.blobs.write().insert(id, data.to_vec());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_views_share_blobs() {
        let network = MemoryNetwork::new();
        let id = network.uploader("up").upload(b"hello").await.unwrap();
        assert_eq!(id, ContentId::for_bytes(b"hello"));
        assert_eq!(network.gateway("gw").fetch(&id).await.unwrap(), b"hello");
        assert_eq!(
            network
                .gateway("gw")
                .fetch(&ContentId::for_bytes(b"other"))
                .await,
            Err(GatewayFailure::NotFound)
        );
    }
}
