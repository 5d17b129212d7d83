//! # Capsule Effects - Handlers
//!
//! **Purpose**: Stateless and simulated implementations of the effect traits
//! declared in `capsule-core`.
//!
//! # Architecture Constraints
//!
//! - YES implement `capsule-core` effect traits
//! - YES wrap external I/O (HTTP gateways, HTTP time APIs, the system clock)
//! - YES in-memory and simulated variants for local runs and tests
//! - NO capsule state or pipeline logic
//! - NO knowledge of time-lock or verification internals
//!
//! ## Handler map
//!
//! | Trait | Production | Local / simulated |
//! |-------|------------|-------------------|
//! | `LedgerClockEffects` | `SystemLedgerClock` | `SimulatedLedgerClock` |
//! | `IdentityEffects` | `StaticIdentityHandler` | same |
//! | `TransactionEffects` | `JournalTransactionHandler` | same |
//! | `ContentGateway` | `HttpGateway` | `MemoryGateway` |
//! | `ContentUploader` | `HttpUploader` | `MemoryUploader` |
//! | `TimeSourceEffects` | `HttpTimeSource`, `LedgerTimeSource` | same |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Ledger clock handlers
pub mod clock;

/// Identity handler
pub mod identity;

/// Tracing subscriber setup
pub mod logging;

/// Storage gateway handlers
pub mod storage;

/// Time source handlers
pub mod time_source;

/// Transaction handler
pub mod transaction;

pub use clock::{SimulatedLedgerClock, SystemLedgerClock};
pub use identity::StaticIdentityHandler;
pub use logging::init_tracing;
pub use storage::{HttpGateway, HttpUploader, MemoryGateway, MemoryNetwork, MemoryUploader};
pub use time_source::{HttpTimeSource, LedgerTimeSource};
pub use transaction::{JournalEntry, JournalTransactionHandler};
