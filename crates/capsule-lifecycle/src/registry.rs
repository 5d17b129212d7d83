//! Capsule registry
//!
//! Every mutation is committed through the transaction collaborator first and
//! applied to the in-memory record only after a successful receipt, so a failed
//! commit leaves the capsule exactly as it was. Callers serialize mutations per
//! capsule; a record that moved between check and apply is rejected rather
//! than overwritten.

use crate::capsule::{Capsule, KeyEnvelope, NewCapsule};
use capsule_core::effects::{CapsuleOperation, TransactionEffects, TxReceipt};
use capsule_core::{CapsuleError, CapsuleId, CapsuleState, ContentId, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// In-memory capsule records backed by ledger commits
pub struct CapsuleRegistry {
    capsules: RwLock<HashMap<CapsuleId, Capsule>>,
    /// Next identifier, claimed only once its create commit lands
    next_id: Mutex<u64>,
    ledger: Arc<dyn TransactionEffects>,
}

impl CapsuleRegistry {
    /// Empty registry committing through `ledger`
    pub fn new(ledger: Arc<dyn TransactionEffects>) -> Self {
        Self {
            capsules: RwLock::new(HashMap::new()),
            next_id: Mutex::new(1),
            ledger,
        }
    }

    /// Snapshot of a capsule
    pub fn get(&self, id: CapsuleId) -> Result<Capsule> {
        self.capsules
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CapsuleError::not_found(format!("{id}")))
    }

    /// Current state of a capsule
    pub fn state(&self, id: CapsuleId) -> Result<CapsuleState> {
        self.capsules
            .read()
            .get(&id)
            .map(Capsule::state)
            .ok_or_else(|| CapsuleError::not_found(format!("{id}")))
    }

    /// Number of capsules
    pub fn len(&self) -> usize {
        self.capsules.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.capsules.read().is_empty()
    }

    /// Record a new capsule in `Created`
    ///
    /// Creates are serialized; a rejected commit leaves the identifier free for
    /// the next create.
    pub async fn create(&self, spec: NewCapsule) -> Result<CapsuleId> {
        let mut next_id = self.next_id.lock().await;
        let id = CapsuleId::new(*next_id);
        self.commit(CapsuleOperation::Create {
            capsule_id: id,
            creator: spec.creator.clone(),
            recipient: spec.recipient.clone(),
            condition: spec.condition,
        })
        .await?;
        *next_id += 1;

        self.capsules.write().insert(id, Capsule::new(id, spec));
        info!(capsule = %id, "Capsule created");
        Ok(id)
    }

    /// Attach stored content and time-locked key, moving to `Locked`
    ///
    /// A single `Seal` commit carries the move from `Created` to `Locked`.
    pub async fn seal(&self, id: CapsuleId, content_id: ContentId, key: KeyEnvelope) -> Result<()> {
        let mut updated = self.get(id)?;
        let from = updated.state();
        updated.set_content_id(content_id)?;
        updated.set_key(key)?;
        updated.transition(CapsuleState::Locked)?;

        self.commit(CapsuleOperation::Seal {
            capsule_id: id,
            content_id,
        })
        .await?;

        self.replace(id, from, updated)?;
        info!(capsule = %id, content_id = %content_id, "Capsule sealed and locked");
        Ok(())
    }

    /// Move a capsule to `to`
    pub async fn transition(&self, id: CapsuleId, to: CapsuleState) -> Result<()> {
        let mut updated = self.get(id)?;
        let from = updated.state();
        updated.transition(to)?;

        self.commit(CapsuleOperation::Transition {
            capsule_id: id,
            from,
            to,
        })
        .await?;

        self.replace(id, from, updated)?;
        debug!(capsule = %id, %from, %to, "Capsule transitioned");
        Ok(())
    }

    fn replace(&self, id: CapsuleId, expected: CapsuleState, updated: Capsule) -> Result<()> {
        let mut capsules = self.capsules.write();
        let current = capsules
            .get_mut(&id)
            .ok_or_else(|| CapsuleError::not_found(format!("{id}")))?;
        if current.state() != expected {
            warn!(capsule = %id, expected = %expected, actual = %current.state(), "Capsule moved during commit");
            return Err(CapsuleError::InvalidTransition {
                from: current.state().to_string(),
                to: updated.state().to_string(),
            });
        }
        *current = updated;
        Ok(())
    }

    async fn commit(&self, operation: CapsuleOperation) -> Result<TxReceipt> {
        let capsule_id = operation.capsule_id();
        let receipt = self
            .ledger
            .submit(operation)
            .await
            .map_err(|e| CapsuleError::transaction(e.to_string()))?;
        if !receipt.success {
            warn!(capsule = %capsule_id, tx = %receipt.tx_id, "Ledger rejected capsule commit");
            return Err(CapsuleError::transaction(format!(
                "transaction {} failed",
                receipt.tx_id
            )));
        }
        Ok(receipt)
    }
}

impl std::fmt::Debug for CapsuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapsuleRegistry")
            .field("capsules", &self.len())
            .finish_non_exhaustive()
    }
}
