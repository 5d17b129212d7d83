//! Validator interface

use crate::result::{ValidatorCost, VerificationResult};
use async_trait::async_trait;
use capsule_core::{CapsuleId, Identity, UnlockCondition};
use capsule_timelock::LockHandle;
use std::sync::Arc;

/// Everything a validator may inspect about one unlock attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationContext {
    /// Capsule being unlocked
    pub capsule_id: CapsuleId,
    /// Identity asking for the unlock
    pub requester: Identity,
    /// Recipient recorded on the capsule
    pub recipient: Identity,
    /// Unlock condition recorded on the capsule
    pub condition: UnlockCondition,
    /// Time-lock handle for the capsule key
    pub lock_handle: LockHandle,
}

/// A named, independent unlock check
#[async_trait]
pub trait Validator: Send + Sync {
    /// Name used in results and reasons
    fn name(&self) -> &str;

    /// Cost class controlling ordering and short-circuiting
    fn cost(&self) -> ValidatorCost;

    /// Whether a quorum policy may never outvote this validator
    fn mandatory(&self) -> bool {
        false
    }

    /// Run the check
    async fn validate(&self, context: &VerificationContext) -> VerificationResult;
}

#[async_trait]
impl<T: Validator + ?Sized> Validator for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn cost(&self) -> ValidatorCost {
        (**self).cost()
    }

    fn mandatory(&self) -> bool {
        (**self).mandatory()
    }

    async fn validate(&self, context: &VerificationContext) -> VerificationResult {
        (**self).validate(context).await
    }
}
