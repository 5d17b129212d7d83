//! # Capsule Core - Foundation
//!
//! **Purpose**: Types, errors and effect interfaces shared by every capsule crate.
//!
//! A capsule is content locked until a future timestamp or block height, after which
//! a designated recipient may decrypt it. This crate carries the vocabulary of the
//! unlock pipeline and nothing that performs I/O.
//!
//! # Architecture Constraints
//!
//! - YES identifiers, unlock conditions, lifecycle states
//! - YES the unified error taxonomy
//! - YES pure effect traits for the ledger clock, identity, transactions,
//!   time sources and storage gateways
//! - YES payload AEAD and zeroizing decryption material
//! - NO effect handler implementations (those are in `capsule-effects`)
//! - NO orchestration (that is `capsule-agent`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Unlock conditions and remaining-time arithmetic
pub mod condition;

/// Configuration loading, overrides and validation
pub mod config;

/// Payload encryption and decryption material
pub mod crypto;

/// Effect interfaces for external collaborators
pub mod effects;

/// Unified error handling
pub mod errors;

/// Content-addressing hash
pub mod hash;

/// Capsule, identity and content identifiers
pub mod identifiers;

/// Retry policy for transient failures
pub mod reliability;

pub use condition::{LedgerReading, Remaining, UnlockCondition};
pub use config::{
    CapsuleConfig, ConfigValidation, ConsensusPolicy, LedgerConfig, LoggingConfig,
    ReductionPolicy, StoreConfig, TimeLockConfig, VerificationConfig,
};
pub use crypto::{open_payload, seal_payload, DecryptionMaterial, KEY_LEN, NONCE_LEN};
pub use errors::{CapsuleError, Result, StorageOperation};
pub use identifiers::{CapsuleId, CapsuleState, ContentId, Identity};
pub use reliability::{AttemptError, BackoffStrategy, RetryPolicy, RetryResult};
