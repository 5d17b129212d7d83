//! Ledger clock handlers

pub mod real;
pub mod simulated;

pub use real::SystemLedgerClock;
pub use simulated::SimulatedLedgerClock;
