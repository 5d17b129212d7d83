//! Unlock conditions and remaining-time arithmetic

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default drift tolerance for timestamp conditions (seconds)
pub const DEFAULT_TIMESTAMP_TOLERANCE_SECS: u64 = 300;

/// Default drift tolerance for block-height conditions (blocks)
pub const DEFAULT_HEIGHT_TOLERANCE_BLOCKS: u64 = 2;

/// A single observation of the authoritative ledger clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReading {
    /// Ledger timestamp in Unix seconds
    pub timestamp: u64,
    /// Ledger block height
    pub height: u64,
}

impl LedgerReading {
    /// Create a reading
    pub fn new(timestamp: u64, height: u64) -> Self {
        Self { timestamp, height }
    }
}

/// Condition after which a capsule may be decrypted
///
/// Satisfaction is judged strictly against the authoritative ledger. The tolerance
/// window is how far behind an external clock may read and still corroborate that
/// the condition has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnlockCondition {
    /// Absolute Unix timestamp
    Timestamp {
        /// Unlock time in Unix seconds
        unlock_at: u64,
        /// Drift tolerance in seconds
        tolerance_secs: u64,
    },
    /// Target block height
    BlockHeight {
        /// Unlock height
        height: u64,
        /// Drift tolerance in blocks
        tolerance_blocks: u64,
    },
}

impl UnlockCondition {
    /// Timestamp condition with the default tolerance
    pub fn at_timestamp(unlock_at: u64) -> Self {
        Self::Timestamp {
            unlock_at,
            tolerance_secs: DEFAULT_TIMESTAMP_TOLERANCE_SECS,
        }
    }

    /// Block-height condition with the default tolerance
    pub fn at_height(height: u64) -> Self {
        Self::BlockHeight {
            height,
            tolerance_blocks: DEFAULT_HEIGHT_TOLERANCE_BLOCKS,
        }
    }

    /// Short name of the condition kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timestamp { .. } => "timestamp",
            Self::BlockHeight { .. } => "block_height",
        }
    }

    /// Whether the ledger has reached the condition
    pub fn is_satisfied(&self, reading: &LedgerReading) -> bool {
        match *self {
            Self::Timestamp { unlock_at, .. } => reading.timestamp >= unlock_at,
            Self::BlockHeight { height, .. } => reading.height >= height,
        }
    }

    /// Remaining wait, or `None` once satisfied
    pub fn remaining(&self, reading: &LedgerReading, block_time_secs: u64) -> Option<Remaining> {
        if self.is_satisfied(reading) {
            return None;
        }
        Some(match *self {
            Self::Timestamp { unlock_at, .. } => {
                Remaining::Seconds(unlock_at.saturating_sub(reading.timestamp))
            }
            Self::BlockHeight { height, .. } => {
                let blocks = height.saturating_sub(reading.height);
                Remaining::Blocks {
                    blocks,
                    approx_secs: blocks.saturating_mul(block_time_secs),
                }
            }
        })
    }

    /// Seconds elapsed since the condition was reached, `None` if not yet reached
    pub fn elapsed_since(&self, reading: &LedgerReading, block_time_secs: u64) -> Option<u64> {
        if !self.is_satisfied(reading) {
            return None;
        }
        Some(match *self {
            Self::Timestamp { unlock_at, .. } => reading.timestamp - unlock_at,
            Self::BlockHeight { height, .. } => {
                (reading.height - height).saturating_mul(block_time_secs)
            }
        })
    }

    /// Earliest external-clock reading that corroborates a timestamp condition
    pub fn corroboration_floor(&self) -> Option<u64> {
        match *self {
            Self::Timestamp {
                unlock_at,
                tolerance_secs,
            } => Some(unlock_at.saturating_sub(tolerance_secs)),
            Self::BlockHeight { .. } => None,
        }
    }

    /// Canonical byte encoding used for key derivation and commitments
    pub fn encode(&self) -> [u8; 9] {
        let (tag, target) = match *self {
            Self::Timestamp { unlock_at, .. } => (0u8, unlock_at),
            Self::BlockHeight { height, .. } => (1u8, height),
        };
        let mut out = [0u8; 9];
        out[0] = tag;
        out[1..].copy_from_slice(&target.to_be_bytes());
        out
    }
}

impl fmt::Display for UnlockCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp { unlock_at, .. } => write!(f, "timestamp >= {unlock_at}"),
            Self::BlockHeight { height, .. } => write!(f, "height >= {height}"),
        }
    }
}

/// Wait remaining until an unlock condition holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Remaining {
    /// Seconds until a timestamp condition
    Seconds(u64),
    /// Blocks until a height condition, with a wall-clock estimate
    Blocks {
        /// Blocks still to be produced
        blocks: u64,
        /// Estimated seconds at the configured block time
        approx_secs: u64,
    },
}

impl Remaining {
    /// Approximate wait in seconds
    pub fn approx_secs(&self) -> u64 {
        match *self {
            Self::Seconds(secs) => secs,
            Self::Blocks { approx_secs, .. } => approx_secs,
        }
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(secs) => write!(f, "{secs}s"),
            Self::Blocks {
                blocks,
                approx_secs,
            } => write!(f, "{blocks} blocks (~{approx_secs}s)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_condition() {
        let cond = UnlockCondition::at_timestamp(1_000);
        assert!(!cond.is_satisfied(&LedgerReading::new(999, 0)));
        assert!(cond.is_satisfied(&LedgerReading::new(1_000, 0)));
        assert_eq!(
            cond.remaining(&LedgerReading::new(990, 0), 12),
            Some(Remaining::Seconds(10))
        );
        assert_eq!(cond.remaining(&LedgerReading::new(1_001, 0), 12), None);
        assert_eq!(cond.corroboration_floor(), Some(700));
    }

    #[test]
    fn test_height_condition_estimates_time() {
        let cond = UnlockCondition::at_height(100);
        let remaining = cond.remaining(&LedgerReading::new(0, 95), 12);
        assert_eq!(
            remaining,
            Some(Remaining::Blocks {
                blocks: 5,
                approx_secs: 60
            })
        );
        assert_eq!(cond.elapsed_since(&LedgerReading::new(0, 102), 12), Some(24));
        assert_eq!(cond.corroboration_floor(), None);
    }

    #[test]
    fn test_encoding_distinguishes_kinds() {
        let ts = UnlockCondition::at_timestamp(42).encode();
        let height = UnlockCondition::at_height(42).encode();
        assert_ne!(ts, height);
        assert_eq!(&ts[1..], &42u64.to_be_bytes());
    }
}
