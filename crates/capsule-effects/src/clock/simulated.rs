//! Simulated ledger clock for testing and simulation

use async_trait::async_trait;
use capsule_core::effects::{ClockError, LedgerClockEffects};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct LedgerState {
    timestamp: u64,
    height: u64,
    offline: bool,
}

/// Manually driven ledger clock
///
/// Clones share the same underlying clock, so a test can hand one clone to the
/// pipeline and advance time through another.
#[derive(Debug, Clone)]
pub struct SimulatedLedgerClock {
    state: Arc<Mutex<LedgerState>>,
    block_time_secs: u64,
}

impl SimulatedLedgerClock {
    /// Start at the given timestamp and height
    pub fn new(timestamp: u64, height: u64) -> Self {
        Self::with_block_time(timestamp, height, 12)
    }

    /// Start with a custom block interval
    pub fn with_block_time(timestamp: u64, height: u64, block_time_secs: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                timestamp,
                height,
                offline: false,
            })),
            block_time_secs: block_time_secs.max(1),
        }
    }

    /// Advance time; height follows at the configured block interval
    pub fn advance_secs(&self, secs: u64) {
        let mut state = self.state.lock();
        let before = state.timestamp / self.block_time_secs;
        state.timestamp += secs;
        let after = state.timestamp / self.block_time_secs;
        state.height += after - before;
    }

    /// Advance by whole blocks
    pub fn advance_blocks(&self, blocks: u64) {
        self.advance_secs(blocks * self.block_time_secs);
    }

    /// Set the absolute timestamp without touching height
    pub fn set_timestamp(&self, timestamp: u64) {
        self.state.lock().timestamp = timestamp;
    }

    /// Current simulated timestamp
    pub fn timestamp(&self) -> u64 {
        self.state.lock().timestamp
    }

    /// Current simulated height
    pub fn height(&self) -> u64 {
        self.state.lock().height
    }

    /// Make every query fail until brought back online
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    fn check_online(state: &LedgerState) -> Result<(), ClockError> {
        if state.offline {
            return Err(ClockError::Unavailable {
                reason: "simulated ledger offline".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SimulatedLedgerClock {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[async_trait]
impl LedgerClockEffects for SimulatedLedgerClock {
    async fn current_timestamp(&self) -> Result<u64, ClockError> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        Ok(state.timestamp)
    }

    async fn current_height(&self) -> Result<u64, ClockError> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        Ok(state.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_advance_moves_time_and_height() {
        let clock = SimulatedLedgerClock::with_block_time(1_000, 50, 10);
        let observer = clock.clone();
        clock.advance_secs(25);
        let reading = observer.reading().await.unwrap();
        assert_eq!(reading.timestamp, 1_025);
        assert_eq!(reading.height, 52);
        clock.advance_blocks(3);
        assert_eq!(observer.height(), 55);
    }

    #[tokio::test]
    async fn test_offline_ledger_fails() {
        let clock = SimulatedLedgerClock::default();
        clock.set_offline(true);
        assert!(clock.current_timestamp().await.is_err());
        clock.set_offline(false);
        assert_eq!(clock.current_timestamp().await.unwrap(), 0);
    }
}
