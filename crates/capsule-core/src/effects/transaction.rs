//! Ledger transaction submission for capsule state commits
//!
//! The core treats a receipt as "capsule state committed" and looks no further
//! than its success flag.

use crate::condition::UnlockCondition;
use crate::identifiers::{CapsuleId, CapsuleState, ContentId, Identity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Capsule operation persisted through the transaction submitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapsuleOperation {
    /// A new capsule record
    Create {
        /// Assigned identifier
        capsule_id: CapsuleId,
        /// Creator identity
        creator: Identity,
        /// Recipient identity
        recipient: Identity,
        /// Unlock condition
        condition: UnlockCondition,
    },
    /// Content and time-locked key attached; moves the capsule from `Created`
    /// to `Locked`
    Seal {
        /// Capsule being sealed
        capsule_id: CapsuleId,
        /// Stored ciphertext identifier
        content_id: ContentId,
    },
    /// Lifecycle transition
    Transition {
        /// Capsule being transitioned
        capsule_id: CapsuleId,
        /// Previous state
        from: CapsuleState,
        /// New state
        to: CapsuleState,
    },
}

impl CapsuleOperation {
    /// Capsule the operation concerns
    pub fn capsule_id(&self) -> CapsuleId {
        match self {
            Self::Create { capsule_id, .. }
            | Self::Seal { capsule_id, .. }
            | Self::Transition { capsule_id, .. } => *capsule_id,
        }
    }
}

/// Receipt for a submitted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Backend transaction identifier
    pub tx_id: String,
    /// Whether the ledger accepted the operation
    pub success: bool,
}

/// Error type for transaction submission
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum TransactionError {
    /// Submitter unreachable
    #[error("Submitter unavailable: {reason}")]
    Unavailable {
        /// Failure description
        reason: String,
    },
    /// Ledger rejected the operation
    #[error("Rejected: {reason}")]
    Rejected {
        /// Failure description
        reason: String,
    },
}

/// Opaque transaction submitter
#[async_trait]
pub trait TransactionEffects: Send + Sync {
    /// Submit an operation and wait for its receipt
    async fn submit(&self, operation: CapsuleOperation) -> Result<TxReceipt, TransactionError>;
}

#[async_trait]
impl<T: TransactionEffects + ?Sized> TransactionEffects for Arc<T> {
    async fn submit(&self, operation: CapsuleOperation) -> Result<TxReceipt, TransactionError> {
        (**self).submit(operation).await
    }
}
