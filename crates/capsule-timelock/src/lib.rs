//! # Capsule Time-Lock
//!
//! **Purpose**: Encrypt a short symmetric key so that nobody can recover it
//! before an unlock condition holds on the reference ledger.
//!
//! # Architecture Constraints
//!
//! - YES the `TimeLockBackend` seam and a beacon backend bound to the ledger clock
//! - YES per-call timeouts and idempotent release caching
//! - NO plaintext fallback when a backend is unavailable
//! - NO payload encryption (the payload key is produced in `capsule-core::crypto`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Backend interface and errors
pub mod backend;

/// Beacon backend
pub mod beacon;

/// Cipher front-end
pub mod cipher;

/// Handles, ciphertexts, status
pub mod types;

pub use backend::{BackendError, TimeLockBackend};
pub use beacon::BeaconTimeLock;
pub use cipher::TimeLockCipher;
pub use types::{ConditionStatus, LockHandle, TimeLockCiphertext};
