//! Randomness-beacon time-lock backend
//!
//! Models a beacon that publishes one key per unlock condition once the
//! reference ledger reaches it. Round keys are HKDF-SHA256 derivations of the
//! beacon secret over the condition encoding; secrets are sealed under them
//! with ChaCha20-Poly1305, the condition bound in as associated data. The
//! beacon secret never leaves this type, and nothing is released early.

use crate::backend::{BackendError, TimeLockBackend};
use crate::types::{ConditionStatus, LockHandle, TimeLockCiphertext};
use async_trait::async_trait;
use capsule_core::effects::LedgerClockEffects;
use capsule_core::UnlockCondition;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const ROUND_KEY_SALT: &[u8] = b"capsule-timelock/beacon-round/v1";

/// Beacon-backed time lock bound to a ledger clock
pub struct BeaconTimeLock {
    name: String,
    beacon_secret: Zeroizing<[u8; 32]>,
    clock: Arc<dyn LedgerClockEffects>,
    block_time_secs: u64,
    expiry_window_secs: Option<u64>,
    locks: RwLock<HashMap<LockHandle, TimeLockCiphertext>>,
    offline: AtomicBool,
    releases: AtomicUsize,
}

impl BeaconTimeLock {
    /// Beacon with a fresh random secret
    pub fn new(clock: Arc<dyn LedgerClockEffects>, block_time_secs: u64) -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Self::with_secret(secret, clock, block_time_secs)
    }

    /// Beacon with a fixed secret
    pub fn with_secret(
        secret: [u8; 32],
        clock: Arc<dyn LedgerClockEffects>,
        block_time_secs: u64,
    ) -> Self {
        Self {
            name: "beacon".to_string(),
            beacon_secret: Zeroizing::new(secret),
            clock,
            block_time_secs,
            expiry_window_secs: None,
            locks: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
            releases: AtomicUsize::new(0),
        }
    }

    /// Stop releasing keys this long after a condition is reached
    pub fn with_expiry(mut self, window_secs: Option<u64>) -> Self {
        self.expiry_window_secs = window_secs;
        self
    }

    /// Simulate the beacon network being unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of round keys actually published to callers
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Number of locks issued
    pub fn lock_count(&self) -> usize {
        self.locks.read().len()
    }

    fn ensure_online(&self) -> Result<(), BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            warn!(backend = %self.name, "Beacon unreachable");
            return Err(BackendError::unavailable("beacon network unreachable"));
        }
        Ok(())
    }

    fn round_key(&self, condition: &UnlockCondition) -> Result<Zeroizing<[u8; 32]>, BackendError> {
        let hkdf = Hkdf::<Sha256>::new(Some(ROUND_KEY_SALT), &self.beacon_secret[..]);
        let mut okm = Zeroizing::new([0u8; 32]);
        hkdf.expand(&condition.encode(), &mut okm[..])
            .map_err(|e| BackendError::Corrupt {
                reason: format!("round key derivation failed: {e}"),
            })?;
        Ok(okm)
    }

    fn ciphertext(&self, handle: &LockHandle) -> Result<TimeLockCiphertext, BackendError> {
        self.locks
            .read()
            .get(handle)
            .cloned()
            .ok_or(BackendError::UnknownHandle { handle: *handle })
    }

    async fn evaluate(&self, condition: &UnlockCondition) -> Result<ConditionStatus, BackendError> {
        let reading = self
            .clock
            .reading()
            .await
            .map_err(|e| BackendError::unavailable(e.to_string()))?;

        if let Some(remaining) = condition.remaining(&reading, self.block_time_secs) {
            return Ok(ConditionStatus::Pending(remaining));
        }
        if let (Some(window), Some(elapsed)) = (
            self.expiry_window_secs,
            condition.elapsed_since(&reading, self.block_time_secs),
        ) {
            if elapsed > window {
                return Ok(ConditionStatus::Expired);
            }
        }
        Ok(ConditionStatus::Satisfied)
    }
}

#[async_trait]
impl TimeLockBackend for BeaconTimeLock {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lock(
        &self,
        secret: &[u8],
        condition: UnlockCondition,
    ) -> Result<(TimeLockCiphertext, LockHandle), BackendError> {
        self.ensure_online()?;

        let key = self.round_key(&condition)?;
        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);
        let aad = condition.encode();
        let sealed = ChaCha20Poly1305::new(Key::from_slice(&key[..]))
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: secret,
                    aad: &aad,
                },
            )
            .map_err(|_| BackendError::Corrupt {
                reason: "sealing failed".to_string(),
            })?;

        let ciphertext = TimeLockCiphertext {
            condition,
            backend: self.name.clone(),
            nonce,
            sealed,
        };
        let handle = LockHandle::new();
        self.locks.write().insert(handle, ciphertext.clone());
        debug!(handle = %handle, condition = %condition, "Secret sealed to beacon round");
        Ok((ciphertext, handle))
    }

    async fn status(&self, handle: &LockHandle) -> Result<ConditionStatus, BackendError> {
        self.ensure_online()?;
        let ciphertext = self.ciphertext(handle)?;
        self.evaluate(&ciphertext.condition).await
    }

    async fn release(&self, handle: &LockHandle) -> Result<Zeroizing<Vec<u8>>, BackendError> {
        self.ensure_online()?;
        let ciphertext = self.ciphertext(handle)?;

        match self.evaluate(&ciphertext.condition).await? {
            ConditionStatus::Pending(remaining) => {
                return Err(BackendError::ConditionNotMet { remaining });
            }
            ConditionStatus::Expired => {
                return Err(BackendError::Expired {
                    condition: ciphertext.condition,
                });
            }
            ConditionStatus::Satisfied => {}
        }

        let key = self.round_key(&ciphertext.condition)?;
        let aad = ciphertext.condition.encode();
        let secret = ChaCha20Poly1305::new(Key::from_slice(&key[..]))
            .decrypt(
                Nonce::from_slice(&ciphertext.nonce),
                Payload {
                    msg: &ciphertext.sealed,
                    aad: &aad,
                },
            )
            .map_err(|_| BackendError::Corrupt {
                reason: "round key does not open the sealed secret".to_string(),
            })?;

        self.releases.fetch_add(1, Ordering::SeqCst);
        info!(handle = %handle, condition = %ciphertext.condition, "Beacon round key published");
        Ok(Zeroizing::new(secret))
    }
}

impl std::fmt::Debug for BeaconTimeLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeaconTimeLock")
            .field("name", &self.name)
            .field("block_time_secs", &self.block_time_secs)
            .field("expiry_window_secs", &self.expiry_window_secs)
            .field("locks", &self.lock_count())
            .field("releases", &self.release_count())
            .finish_non_exhaustive()
    }
}
