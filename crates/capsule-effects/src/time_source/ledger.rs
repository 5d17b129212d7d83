//! Authoritative time source backed by the ledger clock

use async_trait::async_trait;
use capsule_core::effects::{LedgerClockEffects, SourceKind, TimeSourceEffects, TimeSourceError};
use std::sync::Arc;

/// Exposes a ledger clock as the authoritative reference for time consensus
pub struct LedgerTimeSource {
    name: String,
    clock: Arc<dyn LedgerClockEffects>,
}

impl LedgerTimeSource {
    /// Wrap a ledger clock
    pub fn new(name: impl Into<String>, clock: Arc<dyn LedgerClockEffects>) -> Self {
        Self {
            name: name.into(),
            clock,
        }
    }
}

impl std::fmt::Debug for LedgerTimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerTimeSource")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl TimeSourceEffects for LedgerTimeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Authoritative
    }

    async fn now(&self) -> Result<u64, TimeSourceError> {
        self.clock
            .current_timestamp()
            .await
            .map_err(|e| TimeSourceError::Unavailable {
                reason: e.to_string(),
            })
    }
}
