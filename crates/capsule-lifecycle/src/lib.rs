//! # Capsule Lifecycle
//!
//! **Purpose**: The capsule record, its state machine, and the registry that
//! commits every change to the ledger before applying it.
//!
//! # Architecture Constraints
//!
//! - YES the transition table and write-once record fields
//! - YES ledger commits through `TransactionEffects`
//! - NO decisions about when to transition (that is `capsule-agent`)
//! - NO storage or time-lock calls

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Capsule record
pub mod capsule;

/// Registry backed by ledger commits
pub mod registry;

/// State machine
pub mod state_machine;

pub use capsule::{Capsule, KeyEnvelope, NewCapsule};
pub use registry::CapsuleRegistry;
pub use state_machine::{can_transition, CapsuleStateMachine};
