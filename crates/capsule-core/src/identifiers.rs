//! Capsule, identity and content identifiers

use crate::errors::CapsuleError;
use crate::hash::hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// Opaque numeric capsule identifier, assigned sequentially at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapsuleId(pub u64);

impl CapsuleId {
    /// Wrap a raw identifier
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capsule-{}", self.0)
    }
}

/// Identity of a creator, recipient or requester
///
/// Address-like identities (`0x` followed by hex) compare case-insensitively;
/// everything else compares exactly.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Wrap an identity string
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identity looks like a hex account address
    pub fn is_address_like(&self) -> bool {
        let Some(rest) = self
            .0
            .strip_prefix("0x")
            .or_else(|| self.0.strip_prefix("0X"))
        else {
            return false;
        };
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Identity comparison used for authorization decisions
    pub fn matches(&self, other: &Identity) -> bool {
        if self.is_address_like() && other.is_address_like() {
            self.0.eq_ignore_ascii_case(&other.0)
        } else {
            self.0 == other.0
        }
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl std::hash::Hash for Identity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.is_address_like() {
            self.0.to_ascii_lowercase().hash(state);
        } else {
            self.0.hash(state);
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Prefix marking a hex-encoded SHA-256 content identifier
const CONTENT_ID_PREFIX: char = 'b';

/// Hash-derived identifier for content in the storage network
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId([u8; 32]);

impl ContentId {
    /// Identifier for the given bytes
    pub fn for_bytes(data: &[u8]) -> Self {
        Self(hash(data))
    }

    /// Wrap a raw digest
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Raw digest
    pub fn digest(&self) -> &[u8; 32] {
        &self.0
    }

    /// Recompute the digest over `data` and compare in constant time
    pub fn verify(&self, data: &[u8]) -> bool {
        let actual = hash(data);
        bool::from(self.0.ct_eq(&actual))
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CONTENT_ID_PREFIX}{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({self})")
    }
}

impl FromStr for ContentId {
    type Err = CapsuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(CONTENT_ID_PREFIX)
            .ok_or_else(|| CapsuleError::invalid(format!("content id missing prefix: {s}")))?;
        let bytes = hex::decode(body)
            .map_err(|e| CapsuleError::invalid(format!("content id not hex: {e}")))?;
        let digest: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            CapsuleError::invalid(format!("content id has {} bytes, expected 32", b.len()))
        })?;
        Ok(Self(digest))
    }
}

/// Lifecycle state of a capsule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapsuleState {
    /// Submitted, content and key not yet recorded
    Created,
    /// Ciphertext stored and key time-locked
    Locked,
    /// Unlock condition observed satisfied
    Unlockable,
    /// Last unlock attempt failed; always returns to `Unlockable`
    UnlockFailed,
    /// Content decrypted; terminal
    Unlocked,
}

impl CapsuleState {
    /// Position in the forward ordering; `UnlockFailed` shares the `Unlockable` rank
    pub fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Locked => 1,
            Self::Unlockable | Self::UnlockFailed => 2,
            Self::Unlocked => 3,
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unlocked)
    }
}

impl fmt::Display for CapsuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Locked => "locked",
            Self::Unlockable => "unlockable",
            Self::UnlockFailed => "unlock_failed",
            Self::Unlocked => "unlocked",
        };
        f.write_str(name)
    }
}
