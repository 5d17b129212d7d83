//! # Capsule Agent - Orchestration
//!
//! **Purpose**: Create capsules and carry unlock attempts through verification,
//! key release, retrieval and decryption as a single all-or-nothing operation.
//!
//! A capsule reaches `Unlocked` only when every step has succeeded. Concurrent
//! attempts on one capsule are serialized; attempts on different capsules run
//! independently. A failure after verification leaves the capsule `Unlockable`
//! so the caller can retry.
//!
//! # Architecture Constraints
//!
//! - YES `CapsuleService` facade and builder wiring every collaborator
//! - YES per-capsule serialization with keyed async locks
//! - YES in-memory cache of decrypted content for idempotent unlocks
//! - YES audit trail of attempts and validator results
//! - NO effect handler implementations (those are in `capsule-effects`)
//! - NO retries on behalf of the caller

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Audit trail of unlock attempts
pub mod audit;

/// Per-capsule async locks
pub mod locks;

/// Unlock orchestration
pub mod orchestrator;

/// Service facade and builder
pub mod service;

pub use audit::{AuditEntry, AuditLog, AuditOutcome};
pub use locks::KeyedLocks;
pub use orchestrator::{CapsuleStatus, DecryptedContent, OrchestratorParts, UnlockOrchestrator};
pub use service::{CapsuleService, CapsuleServiceBuilder, CreateCapsule};
