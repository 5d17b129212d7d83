//! Pure synchronous hashing for content addressing and evidence digests
//!
//! Hashing is deterministic and side-effect free, so it lives outside the effect
//! traits. `ALGORITHM` is the single place the digest function is chosen; content
//! identifiers, audit evidence and key commitments all go through `hash()` or
//! `hasher()`.
//!
//! Current algorithm: **SHA-256** (32-byte output)

use sha2::{Digest, Sha256};
use std::fmt;

/// Synchronous trait for cryptographic hashing
pub trait HashAlgorithm: Send + Sync + fmt::Debug {
    /// Hash arbitrary bytes to a 32-byte digest
    fn hash(&self, data: &[u8]) -> [u8; 32];

    /// Create an incremental hasher for multi-part hashing
    fn hasher(&self) -> Box<dyn Hasher>;
}

/// Trait for incremental hashing of multi-part data
pub trait Hasher: Send {
    /// Update the hasher with more data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hasher and return the 32-byte digest
    fn finalize(self: Box<Self>) -> [u8; 32];
}

/// SHA-256 hash implementation
#[derive(Debug, Clone, Copy)]
pub struct Sha256Algorithm;

impl HashAlgorithm for Sha256Algorithm {
    fn hash(&self, data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    fn hasher(&self) -> Box<dyn Hasher> {
        Box::new(Sha256Hasher(Sha256::new()))
    }
}

struct Sha256Hasher(Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> [u8; 32] {
        self.0.finalize().into()
    }
}

/// The global hash algorithm used throughout the system.
pub const ALGORITHM: Sha256Algorithm = Sha256Algorithm;

/// Hash bytes with the global algorithm
#[inline]
pub fn hash(data: &[u8]) -> [u8; 32] {
    ALGORITHM.hash(data)
}

/// Incremental hasher using the global algorithm
#[inline]
pub fn hasher() -> Box<dyn Hasher> {
    ALGORITHM.hasher()
}
