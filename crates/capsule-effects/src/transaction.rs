//! Journal-backed transaction handler
//!
//! Appends every committed operation to an in-memory journal and hands back
//! sequential receipts. Deployments bound to a chain replace this with a
//! submitter implementing the same trait.

use async_trait::async_trait;
use capsule_core::effects::{CapsuleOperation, TransactionEffects, TransactionError, TxReceipt};
use capsule_core::CapsuleId;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

/// One committed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Position in the journal, starting at zero
    pub sequence: u64,
    /// Receipt identifier handed to the caller
    pub tx_id: String,
    /// The committed operation
    pub operation: CapsuleOperation,
}

/// Append-only journal of capsule operations
#[derive(Debug, Default)]
pub struct JournalTransactionHandler {
    entries: RwLock<Vec<JournalEntry>>,
    offline: AtomicBool,
}

impl JournalTransactionHandler {
    /// Create an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse all submissions while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.read().clone()
    }

    /// Number of committed operations
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been committed
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Entries for a single capsule, in commit order
    pub fn operations_for(&self, capsule_id: CapsuleId) -> Vec<CapsuleOperation> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.operation.capsule_id() == capsule_id)
            .map(|entry| entry.operation.clone())
            .collect()
    }
}

#[async_trait]
impl TransactionEffects for JournalTransactionHandler {
    async fn submit(&self, operation: CapsuleOperation) -> Result<TxReceipt, TransactionError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransactionError::Unavailable {
                reason: "journal offline".to_string(),
            });
        }

        let mut entries = self.entries.write();
        let sequence = entries.len() as u64;
        let tx_id = format!("tx-{sequence}-{}", Uuid::new_v4().simple());
        debug!(tx_id = %tx_id, capsule = %operation.capsule_id(), "Journal commit");
        entries.push(JournalEntry {
            sequence,
            tx_id: tx_id.clone(),
            operation,
        });
        Ok(TxReceipt { tx_id, success: true })
    }
}
