//! System-clock ledger handler for production use
//!
//! Reads wall-clock time and estimates block height from the configured genesis
//! timestamp and block interval. Deployments bound to a real chain replace this
//! with a node client implementing the same trait.

use async_trait::async_trait;
use capsule_core::effects::{ClockError, LedgerClockEffects};
use capsule_core::LedgerConfig;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Ledger clock backed by the host system clock
#[derive(Debug, Clone)]
pub struct SystemLedgerClock {
    genesis_timestamp: u64,
    block_time_secs: u64,
}

impl SystemLedgerClock {
    /// Create a handler from ledger settings
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            genesis_timestamp: config.genesis_timestamp,
            block_time_secs: config.block_time_secs.max(1),
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

impl Default for SystemLedgerClock {
    fn default() -> Self {
        Self::new(&LedgerConfig::default())
    }
}

#[async_trait]
impl LedgerClockEffects for SystemLedgerClock {
    async fn current_timestamp(&self) -> Result<u64, ClockError> {
        Ok(Self::now_secs())
    }

    async fn current_height(&self) -> Result<u64, ClockError> {
        Ok(Self::now_secs().saturating_sub(self.genesis_timestamp) / self.block_time_secs)
    }
}
