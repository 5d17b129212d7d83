//! Pluggable time-lock backend
//!
//! A backend is whatever actually enforces the time guarantee: a threshold
//! network combining decryption shares, a randomness beacon publishing round
//! keys, or a custodian delivering a key by callback. The cipher in front of it
//! only needs these three calls.

use crate::types::{ConditionStatus, LockHandle, TimeLockCiphertext};
use async_trait::async_trait;
use capsule_core::{CapsuleError, Remaining, UnlockCondition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Failures reported by a backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum BackendError {
    /// Backend unreachable or refusing work
    #[error("Backend unavailable: {reason}")]
    Unavailable {
        /// Failure description
        reason: String,
    },
    /// Release requested before the condition holds
    #[error("Condition not met: {remaining} remaining")]
    ConditionNotMet {
        /// Remaining wait
        remaining: Remaining,
    },
    /// Release requested after the retention window
    #[error("Lock expired for condition {condition}")]
    Expired {
        /// Condition the secret was locked to
        condition: UnlockCondition,
    },
    /// Handle was never issued by this backend
    #[error("Unknown lock handle {handle}")]
    UnknownHandle {
        /// The handle
        handle: LockHandle,
    },
    /// Stored ciphertext failed to open with the published key
    #[error("Corrupt lock ciphertext: {reason}")]
    Corrupt {
        /// Failure description
        reason: String,
    },
}

impl BackendError {
    /// Unavailability helper
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

impl From<BackendError> for CapsuleError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable { reason } => CapsuleError::LockBackendUnavailable { reason },
            BackendError::ConditionNotMet { remaining } => {
                CapsuleError::ConditionNotMet { remaining }
            }
            BackendError::Expired { condition } => CapsuleError::LockExpired { condition },
            BackendError::UnknownHandle { handle } => {
                CapsuleError::not_found(format!("lock handle {handle}"))
            }
            BackendError::Corrupt { reason } => CapsuleError::decryption(reason),
        }
    }
}

/// Time-lock backend interface
#[async_trait]
pub trait TimeLockBackend: Send + Sync {
    /// Backend name recorded in ciphertexts
    fn name(&self) -> &str;

    /// Seal a secret under a condition
    async fn lock(
        &self,
        secret: &[u8],
        condition: UnlockCondition,
    ) -> Result<(TimeLockCiphertext, LockHandle), BackendError>;

    /// Current release status; must not block on the condition
    async fn status(&self, handle: &LockHandle) -> Result<ConditionStatus, BackendError>;

    /// Recover the secret once the condition holds
    async fn release(&self, handle: &LockHandle) -> Result<Zeroizing<Vec<u8>>, BackendError>;
}

#[async_trait]
impl<T: TimeLockBackend + ?Sized> TimeLockBackend for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn lock(
        &self,
        secret: &[u8],
        condition: UnlockCondition,
    ) -> Result<(TimeLockCiphertext, LockHandle), BackendError> {
        (**self).lock(secret, condition).await
    }

    async fn status(&self, handle: &LockHandle) -> Result<ConditionStatus, BackendError> {
        (**self).status(handle).await
    }

    async fn release(&self, handle: &LockHandle) -> Result<Zeroizing<Vec<u8>>, BackendError> {
        (**self).release(handle).await
    }
}
