//! Payload encryption and decryption material
//!
//! Capsule payloads are sealed locally with ChaCha20-Poly1305 under a fresh
//! 256-bit key. Only the key is time-locked; the nonce travels with the capsule
//! metadata. `DecryptionMaterial` zeroes itself on drop and never prints its bytes.

use crate::errors::{CapsuleError, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Symmetric key length in bytes
pub const KEY_LEN: usize = 32;

/// AEAD nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// AEAD authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Symmetric key and nonce needed to open a sealed payload
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DecryptionMaterial {
    key: [u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
}

impl DecryptionMaterial {
    /// Fresh random key and nonce from the OS generator
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut nonce);
        Self { key, nonce }
    }

    /// Rebuild material from a released key and the stored nonce
    pub fn from_parts(key: &[u8], nonce: [u8; NONCE_LEN]) -> Result<Self> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| {
            CapsuleError::decryption(format!(
                "released key has {} bytes, expected {KEY_LEN}",
                key.len()
            ))
        })?;
        Ok(Self { key, nonce })
    }

    /// Copy of the key, zeroed when the wrapper drops
    pub fn key_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.key.to_vec())
    }

    /// Nonce used for the payload
    pub fn nonce(&self) -> [u8; NONCE_LEN] {
        self.nonce
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key))
    }
}

impl fmt::Debug for DecryptionMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionMaterial")
            .field("key", &"<redacted>")
            .field("nonce", &hex::encode(self.nonce))
            .finish()
    }
}

/// Encrypt a payload under the given material
pub fn seal_payload(material: &DecryptionMaterial, plaintext: &[u8]) -> Result<Vec<u8>> {
    material
        .cipher()
        .encrypt(Nonce::from_slice(&material.nonce), plaintext)
        .map_err(|_| CapsuleError::internal("payload encryption failed"))
}

/// Decrypt a payload; any authentication failure is a `DecryptionFailed`
pub fn open_payload(material: &DecryptionMaterial, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_LEN {
        return Err(CapsuleError::decryption(format!(
            "ciphertext of {} bytes is shorter than the authentication tag",
            ciphertext.len()
        )));
    }
    material
        .cipher()
        .decrypt(Nonce::from_slice(&material.nonce), ciphertext)
        .map_err(|_| CapsuleError::decryption("authentication tag mismatch"))
}
