//! # Capsule Store
//!
//! **Purpose**: Reliable access to ciphertext held on a content-addressed storage
//! network.
//!
//! Gateways are replicated and independently available, so retrieval is a
//! fallback chain rather than a single call. Gateways are also untrusted: fetched
//! bytes are re-hashed against their identifier and a mismatch is reported as an
//! `IntegrityViolation`, never as unavailability.
//!
//! ## What's NOT in this crate
//!
//! - HTTP gateway handlers (in `capsule-effects`)
//! - Decryption of the stored payload (in `capsule-agent`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Content store over a ranked gateway list
pub mod store;

pub use store::{ContentStore, FetchedContent};
