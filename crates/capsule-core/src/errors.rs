//! Unified error system for capsule operations
//!
//! A single error type carries the whole unlock-pipeline taxonomy. Every variant
//! holds enough structured detail (gateways tried, validator reasons, remaining
//! time) for a caller to decide whether to retry, wait, or escalate.

use crate::condition::{Remaining, UnlockCondition};
use crate::effects::gateway::GatewayAttempt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage operation that ran out of endpoints or budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageOperation {
    /// Uploading a new blob
    Upload,
    /// Fetching a stored blob through the gateway chain
    Fetch,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageOperation::Upload => write!(f, "upload"),
            StorageOperation::Fetch => write!(f, "fetch"),
        }
    }
}

/// Unified error type for all capsule operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum CapsuleError {
    /// Storage endpoints unreachable after the retry or deadline budget
    #[error("Storage unavailable during {operation}: tried [{}]", join_attempts(.attempts))]
    StorageUnavailable {
        /// Which storage operation failed
        operation: StorageOperation,
        /// Every endpoint attempt, in order
        attempts: Vec<GatewayAttempt>,
    },

    /// Every gateway answered but none served the content
    #[error("Content {content_id} not retrievable: tried [{}]", join_attempts(.attempts))]
    ContentNotRetrievable {
        /// Requested content identifier
        content_id: String,
        /// Every gateway attempt, in order
        attempts: Vec<GatewayAttempt>,
    },

    /// Served bytes do not hash to the claimed identifier
    #[error("Integrity violation for {content_id}: expected {expected}, got {actual}")]
    IntegrityViolation {
        /// Claimed content identifier
        content_id: String,
        /// Expected digest
        expected: String,
        /// Digest of the bytes actually received
        actual: String,
        /// Endpoint that served the bytes, when known
        endpoint: Option<String>,
    },

    /// The time-lock backend could not be reached or refused to operate
    #[error("Time-lock backend unavailable: {reason}")]
    LockBackendUnavailable {
        /// Backend failure description
        reason: String,
    },

    /// Release requested before the unlock condition holds
    #[error("Unlock condition not met: {remaining} remaining")]
    ConditionNotMet {
        /// Time or blocks until the condition holds
        remaining: Remaining,
    },

    /// The verification pipeline rejected the unlock
    #[error("Verification failed: {}", .reasons.join("; "))]
    VerificationFailed {
        /// One human-readable reason per failing validator
        reasons: Vec<String>,
    },

    /// Local decryption failed (wrong key or corrupted ciphertext)
    #[error("Decryption failed: {reason}")]
    DecryptionFailed {
        /// Failure description (never contains key material)
        reason: String,
    },

    /// The lock's retention window closed; the key will never be released
    #[error("Time lock expired for condition {condition}")]
    LockExpired {
        /// Condition the key was locked to
        condition: UnlockCondition,
    },

    /// The capsule cannot be unlocked yet
    #[error("Capsule not yet unlockable: {remaining} remaining")]
    NotYetUnlockable {
        /// Time or blocks until the condition holds
        remaining: Remaining,
    },

    /// A lifecycle transition outside the allowed ordering
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Attempt to overwrite a write-once field
    #[error("Field {field} is immutable once set")]
    ImmutableField {
        /// Field name
        field: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Description of the invalid input
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the failure
        message: String,
    },

    /// Ledger commit failed
    #[error("Transaction failed: {message}")]
    Transaction {
        /// Description of the failure
        message: String,
    },

    /// An external call exceeded its timeout
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

fn join_attempts(attempts: &[GatewayAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl CapsuleError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a lock backend error
    pub fn lock_backend(reason: impl Into<String>) -> Self {
        Self::LockBackendUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a decryption error
    pub fn decryption(reason: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            reason: reason.into(),
        }
    }

    /// Create a transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Failures a caller may retry by re-invoking the operation
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable { .. }
                | Self::LockBackendUnavailable { .. }
                | Self::Timeout { .. }
                | Self::Transaction { .. }
        )
    }

    /// Failures that indicate tampering or a backend inconsistency
    pub fn is_integrity_incident(&self) -> bool {
        matches!(
            self,
            Self::IntegrityViolation { .. } | Self::DecryptionFailed { .. }
        )
    }

    /// Remaining wait reported by the error, if any
    pub fn remaining(&self) -> Option<Remaining> {
        match self {
            Self::ConditionNotMet { remaining } | Self::NotYetUnlockable { remaining } => {
                Some(*remaining)
            }
            _ => None,
        }
    }
}

/// Standard Result type for capsule operations
pub type Result<T> = std::result::Result<T, CapsuleError>;

impl From<serde_json::Error> for CapsuleError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for CapsuleError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}
