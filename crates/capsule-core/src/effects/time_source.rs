//! Reference clocks consulted by time consensus

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Trust class of a time source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// The ledger clock itself; always valid when reachable
    Authoritative,
    /// Corroborating reference clock
    External,
}

/// Error type for time source queries
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum TimeSourceError {
    /// Source did not answer in time
    #[error("Timed out after {timeout_ms}ms")]
    Timeout {
        /// Elapsed timeout
        timeout_ms: u64,
    },
    /// Source unreachable
    #[error("Unavailable: {reason}")]
    Unavailable {
        /// Failure description
        reason: String,
    },
    /// Source answered with something unusable
    #[error("Malformed response: {reason}")]
    Malformed {
        /// Failure description
        reason: String,
    },
}

/// A clock that can be asked for the current Unix time
#[async_trait]
pub trait TimeSourceEffects: Send + Sync {
    /// Name used in verification evidence
    fn name(&self) -> &str;

    /// Trust class
    fn kind(&self) -> SourceKind;

    /// Current Unix time in seconds according to this source
    async fn now(&self) -> Result<u64, TimeSourceError>;
}

#[async_trait]
impl<T: TimeSourceEffects + ?Sized> TimeSourceEffects for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    async fn now(&self) -> Result<u64, TimeSourceError> {
        (**self).now().await
    }
}
