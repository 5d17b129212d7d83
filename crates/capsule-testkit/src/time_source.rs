//! Scriptable reference clocks

use async_trait::async_trait;
use capsule_core::effects::{SourceKind, TimeSourceEffects, TimeSourceError};
use capsule_effects::SimulatedLedgerClock;
use parking_lot::Mutex;
use std::time::Duration;

/// How a [`ScriptedTimeSource`] answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMode {
    /// Follow the ledger clock shifted by this many seconds
    Offset(i64),
    /// Always report this timestamp
    Fixed(u64),
    /// Fail with an unavailability error
    Down,
    /// Never answer within any reasonable timeout
    Hang,
}

/// Time source driven by a simulated ledger clock
#[derive(Debug)]
pub struct ScriptedTimeSource {
    name: String,
    kind: SourceKind,
    clock: SimulatedLedgerClock,
    mode: Mutex<SourceMode>,
}

impl ScriptedTimeSource {
    /// External source tracking the clock exactly
    pub fn external(name: impl Into<String>, clock: SimulatedLedgerClock) -> Self {
        Self::with_kind(name, SourceKind::External, clock)
    }

    /// Authoritative source tracking the clock exactly
    pub fn authoritative(name: impl Into<String>, clock: SimulatedLedgerClock) -> Self {
        Self::with_kind(name, SourceKind::Authoritative, clock)
    }

    fn with_kind(name: impl Into<String>, kind: SourceKind, clock: SimulatedLedgerClock) -> Self {
        Self {
            name: name.into(),
            kind,
            clock,
            mode: Mutex::new(SourceMode::Offset(0)),
        }
    }

    /// Builder form of [`set_mode`](Self::set_mode)
    pub fn with_mode(self, mode: SourceMode) -> Self {
        self.set_mode(mode);
        self
    }

    /// Switch behavior
    pub fn set_mode(&self, mode: SourceMode) {
        *self.mode.lock() = mode;
    }
}

#[async_trait]
impl TimeSourceEffects for ScriptedTimeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn now(&self) -> Result<u64, TimeSourceError> {
        let mode = self.mode.lock().clone();
        match mode {
            SourceMode::Offset(offset) => Ok(self.clock.timestamp().saturating_add_signed(offset)),
            SourceMode::Fixed(timestamp) => Ok(timestamp),
            SourceMode::Down => Err(TimeSourceError::Unavailable {
                reason: "scripted outage".to_string(),
            }),
            SourceMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TimeSourceError::Timeout { timeout_ms: 3_600_000 })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offset_follows_clock() {
        let clock = SimulatedLedgerClock::new(1_000, 0);
        let source = ScriptedTimeSource::external("ntp", clock.clone()).with_mode(SourceMode::Offset(-30));
        assert_eq!(source.now().await.unwrap(), 970);
        clock.advance_secs(100);
        assert_eq!(source.now().await.unwrap(), 1_070);
    }
}
