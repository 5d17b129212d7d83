//! Time-lock handles, ciphertexts and condition status

use capsule_core::{Remaining, UnlockCondition};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Handle for querying and releasing a single lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockHandle(pub Uuid);

impl LockHandle {
    /// Fresh random handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LockHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock-{}", self.0.simple())
    }
}

/// A secret sealed under an unlock condition
///
/// Safe to persist and publish: nothing in it opens before the condition holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLockCiphertext {
    /// Condition the secret is bound to
    pub condition: UnlockCondition,
    /// Backend that produced the ciphertext
    pub backend: String,
    /// AEAD nonce
    pub nonce: [u8; 12],
    /// Sealed secret including its authentication tag
    pub sealed: Vec<u8>,
}

/// Release status of a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    /// Not yet releasable
    Pending(Remaining),
    /// Releasable now
    Satisfied,
    /// Retention window passed; the backend will no longer release
    Expired,
}

impl ConditionStatus {
    /// Whether the lock can be released now
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(remaining) => write!(f, "pending ({remaining} remaining)"),
            Self::Satisfied => f.write_str("satisfied"),
            Self::Expired => f.write_str("expired"),
        }
    }
}
