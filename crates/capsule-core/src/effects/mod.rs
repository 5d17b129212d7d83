//! Effect interfaces for the collaborators the pipeline consumes
//!
//! Pure signatures only; handlers live in `capsule-effects` and `capsule-testkit`.
//! Every collaborator is injected at construction, never reached through globals.
//!
//! - `LedgerClockEffects`: authoritative timestamp and block height
//! - `IdentityEffects`: the caller's identity, no key management
//! - `TransactionEffects`: commit capsule state to a ledger
//! - `TimeSourceEffects`: authoritative or external reference clocks
//! - `ContentGateway` / `ContentUploader`: content-addressed storage endpoints

pub mod gateway;
pub mod identity;
pub mod ledger;
pub mod time_source;
pub mod transaction;

pub use gateway::{ContentGateway, ContentUploader, GatewayAttempt, GatewayFailure};
pub use identity::IdentityEffects;
pub use ledger::{ClockError, LedgerClockEffects};
pub use time_source::{SourceKind, TimeSourceEffects, TimeSourceError};
pub use transaction::{CapsuleOperation, TransactionEffects, TransactionError, TxReceipt};
