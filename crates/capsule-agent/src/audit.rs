//! Unlock audit log
//!
//! One entry per unlock attempt with every validator result. Entries carry
//! evidence digests and error descriptions, never key material or plaintext.

use capsule_core::{CapsuleId, Identity, Remaining};
use capsule_verify::VerificationResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an unlock attempt ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditOutcome {
    /// Content decrypted and the capsule moved to `Unlocked`
    Unlocked,
    /// Already unlocked; cached content returned
    AlreadyUnlocked,
    /// Condition not yet reached
    NotYetUnlockable {
        /// Remaining wait
        remaining: Remaining,
    },
    /// Lock retention window closed before release
    Expired,
    /// Verification pipeline refused
    Rejected {
        /// One line per failing validator
        reasons: Vec<String>,
    },
    /// A step after verification failed
    Failed {
        /// Error description
        error: String,
    },
}

/// One unlock attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Capsule
    pub capsule_id: CapsuleId,
    /// Who asked
    pub requester: Identity,
    /// Result
    pub outcome: AuditOutcome,
    /// Validator results, empty when verification did not run
    pub results: Vec<VerificationResult>,
}

/// Append-only per-capsule audit trail
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RwLock<HashMap<CapsuleId, Vec<AuditEntry>>>,
}

impl AuditLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&self, entry: AuditEntry) {
        self.entries
            .write()
            .entry(entry.capsule_id)
            .or_default()
            .push(entry);
    }

    /// Entries for one capsule, oldest first
    pub fn entries(&self, capsule_id: CapsuleId) -> Vec<AuditEntry> {
        self.entries
            .read()
            .get(&capsule_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_per_capsule() {
        let log = AuditLog::new();
        for (id, outcome) in [
            (1, AuditOutcome::Unlocked),
            (2, AuditOutcome::AlreadyUnlocked),
            (1, AuditOutcome::AlreadyUnlocked),
        ] {
            log.record(AuditEntry {
                capsule_id: CapsuleId::new(id),
                requester: Identity::from("0x01"),
                outcome,
                results: Vec::new(),
            });
        }
        let first = log.entries(CapsuleId::new(1));
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].outcome, AuditOutcome::Unlocked);
        assert!(log.entries(CapsuleId::new(3)).is_empty());
    }
}
