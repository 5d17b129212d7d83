//! Content-addressed storage endpoints

use crate::identifiers::ContentId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Why a single gateway request failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayFailure {
    /// Transport error or server-side failure
    Unavailable {
        /// Failure description
        reason: String,
    },
    /// No answer within the per-request timeout
    Timeout {
        /// Elapsed timeout
        timeout_ms: u64,
    },
    /// The gateway does not have the content
    NotFound,
    /// Body length disagrees with known size metadata
    SizeMismatch {
        /// Known size
        expected: u64,
        /// Served size
        actual: u64,
    },
    /// Client-side rejection other than not-found
    Rejected {
        /// HTTP status or backend code
        status: u16,
    },
    /// The overall fetch deadline expired before this gateway was tried
    DeadlineExceeded,
}

impl GatewayFailure {
    /// Convenience constructor for `Unavailable`
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Whether the failure looks like an availability problem rather than a miss
    pub fn is_unavailability(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Timeout { .. } | Self::DeadlineExceeded
        )
    }
}

impl fmt::Display for GatewayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "unavailable ({reason})"),
            Self::Timeout { timeout_ms } => write!(f, "timed out after {timeout_ms}ms"),
            Self::NotFound => write!(f, "not found"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch (expected {expected}, got {actual})")
            }
            Self::Rejected { status } => write!(f, "rejected with status {status}"),
            Self::DeadlineExceeded => write!(f, "fetch deadline exceeded"),
        }
    }
}

/// One endpoint attempt recorded for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayAttempt {
    /// Endpoint base URL or name
    pub gateway: String,
    /// Failure observed
    pub failure: GatewayFailure,
}

impl GatewayAttempt {
    /// Record an attempt
    pub fn new(gateway: impl Into<String>, failure: GatewayFailure) -> Self {
        Self {
            gateway: gateway.into(),
            failure,
        }
    }
}

impl fmt::Display for GatewayAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.gateway, self.failure)
    }
}

/// Read endpoint serving `GET /content/{id}`
#[async_trait]
pub trait ContentGateway: Send + Sync {
    /// Base URL or name, used in diagnostics
    fn endpoint(&self) -> &str;

    /// Fetch the raw bytes for an identifier
    async fn fetch(&self, id: &ContentId) -> Result<Vec<u8>, GatewayFailure>;
}

#[async_trait]
impl<T: ContentGateway + ?Sized> ContentGateway for Arc<T> {
    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }

    async fn fetch(&self, id: &ContentId) -> Result<Vec<u8>, GatewayFailure> {
        (**self).fetch(id).await
    }
}

/// Write endpoint accepting new blobs
#[async_trait]
pub trait ContentUploader: Send + Sync {
    /// Base URL or name, used in diagnostics
    fn endpoint(&self) -> &str;

    /// Upload bytes and return the identifier the network assigned
    async fn upload(&self, data: &[u8]) -> Result<ContentId, GatewayFailure>;
}

#[async_trait]
impl<T: ContentUploader + ?Sized> ContentUploader for Arc<T> {
    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }

    async fn upload(&self, data: &[u8]) -> Result<ContentId, GatewayFailure> {
        (**self).upload(data).await
    }
}
