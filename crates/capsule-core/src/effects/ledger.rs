//! Authoritative ledger clock

use crate::condition::LedgerReading;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error type for ledger clock queries
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ClockError {
    /// The ledger could not be reached
    #[error("Ledger unavailable: {reason}")]
    Unavailable {
        /// Failure description
        reason: String,
    },
}

/// Ledger clock used as the authoritative time and height reference
#[async_trait]
pub trait LedgerClockEffects: Send + Sync {
    /// Latest ledger timestamp in Unix seconds
    async fn current_timestamp(&self) -> Result<u64, ClockError>;

    /// Latest ledger block height
    async fn current_height(&self) -> Result<u64, ClockError>;

    /// Timestamp and height read together
    async fn reading(&self) -> Result<LedgerReading, ClockError> {
        Ok(LedgerReading::new(
            self.current_timestamp().await?,
            self.current_height().await?,
        ))
    }
}

#[async_trait]
impl<T: LedgerClockEffects + ?Sized> LedgerClockEffects for Arc<T> {
    async fn current_timestamp(&self) -> Result<u64, ClockError> {
        (**self).current_timestamp().await
    }

    async fn current_height(&self) -> Result<u64, ClockError> {
        (**self).current_height().await
    }

    async fn reading(&self) -> Result<LedgerReading, ClockError> {
        (**self).reading().await
    }
}
