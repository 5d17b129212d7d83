//! Time source handlers

pub mod http;
pub mod ledger;

pub use http::HttpTimeSource;
pub use ledger::LedgerTimeSource;
