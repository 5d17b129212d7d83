//! Time-lock cipher
//!
//! Front-end over a [`TimeLockBackend`]. Every backend call carries the
//! configured timeout. Locking either yields a real time-locked ciphertext or
//! fails with `LockBackendUnavailable`; there is no path that stores a secret
//! in the clear. Releases are cached per handle, so repeated calls return the
//! same secret without going back to the backend.

use crate::backend::{BackendError, TimeLockBackend};
use crate::types::{ConditionStatus, LockHandle, TimeLockCiphertext};
use capsule_core::{CapsuleError, Result, TimeLockConfig, UnlockCondition};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Secrets shorter than this are not checked for verbatim leakage
const LEAK_CHECK_MIN_LEN: usize = 16;

/// Time-lock encryption of short secrets
pub struct TimeLockCipher {
    backend: Arc<dyn TimeLockBackend>,
    config: TimeLockConfig,
    released: RwLock<HashMap<LockHandle, Zeroizing<Vec<u8>>>>,
}

impl TimeLockCipher {
    /// Create a cipher over a backend
    pub fn new(backend: Arc<dyn TimeLockBackend>, config: TimeLockConfig) -> Self {
        Self {
            backend,
            config,
            released: RwLock::new(HashMap::new()),
        }
    }

    /// Name of the underlying backend
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether a handle's secret has already been released
    pub fn is_released(&self, handle: &LockHandle) -> bool {
        self.released.read().contains_key(handle)
    }

    /// Seal `secret` so it cannot be recovered before `condition` holds
    pub async fn lock(
        &self,
        secret: &[u8],
        condition: UnlockCondition,
    ) -> Result<(TimeLockCiphertext, LockHandle)> {
        if secret.is_empty() || secret.len() > self.config.max_secret_len {
            return Err(CapsuleError::invalid(format!(
                "secret must be 1..={} bytes, got {}",
                self.config.max_secret_len,
                secret.len()
            )));
        }

        let (ciphertext, handle) = self
            .call("lock", self.backend.lock(secret, condition))
            .await?;

        if ciphertext.condition != condition {
            warn!(backend = %self.backend_name(), "Backend bound secret to a different condition");
            return Err(CapsuleError::lock_backend(
                "backend returned a ciphertext for a different condition",
            ));
        }
        if secret.len() >= LEAK_CHECK_MIN_LEN
            && ciphertext
                .sealed
                .windows(secret.len())
                .any(|window| window == secret)
        {
            warn!(backend = %self.backend_name(), "Backend returned the secret unsealed");
            return Err(CapsuleError::lock_backend(
                "backend returned the secret without time-lock protection",
            ));
        }

        info!(handle = %handle, condition = %condition, backend = %self.backend_name(), "Secret time-locked");
        Ok((ciphertext, handle))
    }

    /// Current release status; never waits for the condition
    pub async fn check_condition(&self, handle: &LockHandle) -> Result<ConditionStatus> {
        if self.is_released(handle) {
            return Ok(ConditionStatus::Satisfied);
        }
        let status = self.call("status", self.backend.status(handle)).await?;
        debug!(handle = %handle, status = %status, "Checked lock condition");
        Ok(status)
    }

    /// Recover the secret; `ConditionNotMet` until the condition holds
    pub async fn release(&self, handle: &LockHandle) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(secret) = self.released.read().get(handle) {
            debug!(handle = %handle, "Returning cached release");
            return Ok(secret.clone());
        }

        let secret = self.call("release", self.backend.release(handle)).await?;
        let mut released = self.released.write();
        let cached = released.entry(*handle).or_insert(secret);
        Ok(cached.clone())
    }

    async fn call<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = std::result::Result<T, BackendError>>,
    ) -> Result<T> {
        let limit = self.config.call_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(|err| {
                if matches!(err, BackendError::Unavailable { .. }) {
                    warn!(operation, backend = %self.backend_name(), error = %err, "Time-lock backend call failed");
                }
                CapsuleError::from(err)
            }),
            Err(_) => {
                warn!(operation, backend = %self.backend_name(), timeout_ms = self.config.call_timeout_ms, "Time-lock backend call timed out");
                Err(CapsuleError::lock_backend(format!(
                    "{operation} timed out after {}ms",
                    self.config.call_timeout_ms
                )))
            }
        }
    }
}

impl std::fmt::Debug for TimeLockCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeLockCipher")
            .field("backend", &self.backend_name())
            .field("released", &self.released.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::BeaconTimeLock;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use capsule_core::Remaining;
    use capsule_effects::SimulatedLedgerClock;
    use std::time::Duration;

    fn config() -> TimeLockConfig {
        TimeLockConfig {
            call_timeout_ms: 100,
            ..TimeLockConfig::default()
        }
    }

    fn cipher(clock: &SimulatedLedgerClock) -> (TimeLockCipher, Arc<BeaconTimeLock>) {
        let beacon = Arc::new(BeaconTimeLock::new(Arc::new(clock.clone()), 12));
        (TimeLockCipher::new(beacon.clone(), config()), beacon)
    }

    /// Backend that hands the secret back verbatim
    struct LeakyBackend;

    #[async_trait]
    impl TimeLockBackend for LeakyBackend {
        fn name(&self) -> &str {
            "leaky"
        }

        async fn lock(
            &self,
            secret: &[u8],
            condition: UnlockCondition,
        ) -> std::result::Result<(TimeLockCiphertext, LockHandle), BackendError> {
            Ok((
                TimeLockCiphertext {
                    condition,
                    backend: "leaky".to_string(),
                    nonce: [0; 12],
                    sealed: secret.to_vec(),
                },
                LockHandle::new(),
            ))
        }

        async fn status(
            &self,
            _handle: &LockHandle,
        ) -> std::result::Result<ConditionStatus, BackendError> {
            Ok(ConditionStatus::Satisfied)
        }

        async fn release(
            &self,
            _handle: &LockHandle,
        ) -> std::result::Result<Zeroizing<Vec<u8>>, BackendError> {
            Err(BackendError::unavailable("unused"))
        }
    }

    /// Backend that never answers
    struct StalledBackend;

    #[async_trait]
    impl TimeLockBackend for StalledBackend {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn lock(
            &self,
            _secret: &[u8],
            _condition: UnlockCondition,
        ) -> std::result::Result<(TimeLockCiphertext, LockHandle), BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(BackendError::unavailable("stalled"))
        }

        async fn status(
            &self,
            _handle: &LockHandle,
        ) -> std::result::Result<ConditionStatus, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(BackendError::unavailable("stalled"))
        }

        async fn release(
            &self,
            _handle: &LockHandle,
        ) -> std::result::Result<Zeroizing<Vec<u8>>, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(BackendError::unavailable("stalled"))
        }
    }

    #[tokio::test]
    async fn test_lock_check_release() {
        let clock = SimulatedLedgerClock::new(1_000, 0);
        let (cipher, beacon) = cipher(&clock);
        let secret = [9u8; 32];
        let (_, handle) = cipher
            .lock(&secret, UnlockCondition::at_timestamp(1_010))
            .await
            .unwrap();

        assert_eq!(
            cipher.check_condition(&handle).await.unwrap(),
            ConditionStatus::Pending(Remaining::Seconds(10))
        );
        assert_matches!(
            cipher.release(&handle).await,
            Err(CapsuleError::ConditionNotMet { .. })
        );

        clock.advance_secs(11);
        let first = cipher.release(&handle).await.unwrap();
        let second = cipher.release(&handle).await.unwrap();
        assert_eq!(first.as_slice(), secret);
        assert_eq!(first, second);
        assert_eq!(beacon.release_count(), 1);
        assert!(cipher.is_released(&handle));
    }

    #[tokio::test]
    async fn test_released_handle_survives_backend_outage() {
        let clock = SimulatedLedgerClock::new(0, 0);
        let (cipher, beacon) = cipher(&clock);
        let (_, handle) = cipher
            .lock(&[1u8; 32], UnlockCondition::at_timestamp(5))
            .await
            .unwrap();
        clock.advance_secs(5);
        cipher.release(&handle).await.unwrap();

        beacon.set_offline(true);
        assert!(cipher.check_condition(&handle).await.unwrap().is_satisfied());
        assert!(cipher.release(&handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_secret_length_enforced() {
        let (cipher, _) = cipher(&SimulatedLedgerClock::default());
        let condition = UnlockCondition::at_timestamp(1);
        assert_matches!(cipher.lock(&[], condition).await, Err(CapsuleError::Invalid { .. }));
        assert_matches!(
            cipher.lock(&[0u8; 33], condition).await,
            Err(CapsuleError::Invalid { .. })
        );
    }

    #[tokio::test]
    async fn test_offline_backend_never_falls_back() {
        let (cipher, beacon) = cipher(&SimulatedLedgerClock::default());
        beacon.set_offline(true);
        let err = cipher
            .lock(&[3u8; 32], UnlockCondition::at_timestamp(10))
            .await
            .unwrap_err();
        assert_matches!(err, CapsuleError::LockBackendUnavailable { .. });
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unsealed_ciphertext_rejected() {
        let cipher = TimeLockCipher::new(Arc::new(LeakyBackend), config());
        assert_matches!(
            cipher.lock(&[5u8; 32], UnlockCondition::at_timestamp(10)).await,
            Err(CapsuleError::LockBackendUnavailable { .. })
        );
    }

    #[tokio::test]
    async fn test_backend_calls_time_out() {
        let cipher = TimeLockCipher::new(Arc::new(StalledBackend), config());
        assert_matches!(
            cipher.lock(&[5u8; 32], UnlockCondition::at_timestamp(10)).await,
            Err(CapsuleError::LockBackendUnavailable { ref reason }) if reason.contains("timed out")
        );
        assert_matches!(
            cipher.check_condition(&LockHandle::new()).await,
            Err(CapsuleError::LockBackendUnavailable { .. })
        );
    }
}
