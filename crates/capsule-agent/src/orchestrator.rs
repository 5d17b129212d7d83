//! Unlock orchestrator
//!
//! Drives one unlock attempt through verification, key release, retrieval and
//! decryption, and moves the capsule to `Unlocked` only when every step has
//! succeeded. Attempts on the same capsule are serialized by a keyed lock; a
//! caller that waited on the lock sees the winner's cached result.
//!
//! ```text
//! cached? ──yes──▶ return content
//!   │no
//! lock(capsule) ─▶ Locked? promote lazily ─▶ Unlockable?
//!   ─▶ verify ─▶ release key ─▶ fetch + verify bytes ─▶ decrypt ─▶ Unlocked
//! ```

use crate::audit::{AuditEntry, AuditLog, AuditOutcome};
use crate::locks::KeyedLocks;
use capsule_core::crypto::TAG_LEN;
use capsule_core::effects::LedgerClockEffects;
use capsule_core::{
    open_payload, CapsuleError, CapsuleId, CapsuleState, DecryptionMaterial, Identity, Remaining,
    Result,
};
use capsule_lifecycle::{Capsule, CapsuleRegistry};
use capsule_store::ContentStore;
use capsule_timelock::{ConditionStatus, TimeLockCipher};
use capsule_verify::{
    AuthorizationValidator, VerificationContext, VerificationPipeline, VerificationResult,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Plaintext recovered from a capsule
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedContent {
    /// Source capsule
    pub capsule_id: CapsuleId,
    /// Capsule title
    pub title: String,
    /// MIME-style content type tag
    pub content_type: String,
    /// Plaintext bytes
    pub bytes: Arc<[u8]>,
}

impl std::fmt::Debug for DecryptedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedContent")
            .field("capsule_id", &self.capsule_id)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Decrypted content held for the capsule's recipient
#[derive(Clone)]
struct CachedUnlock {
    recipient: Identity,
    content: DecryptedContent,
}

/// Externally visible capsule status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleStatus {
    /// Capsule
    pub capsule_id: CapsuleId,
    /// Lifecycle state
    pub state: CapsuleState,
    /// Unlock condition
    pub condition: capsule_core::UnlockCondition,
    /// Wait until the condition holds, `None` once reached
    pub remaining: Option<Remaining>,
    /// Whether the time lock stopped releasing
    pub expired: bool,
    /// Stored ciphertext identifier
    pub content_id: Option<String>,
    /// Plaintext size in bytes
    pub size: u64,
    /// MIME-style content type tag
    pub content_type: String,
}

/// Collaborators an orchestrator drives
pub struct OrchestratorParts {
    /// Capsule records
    pub registry: Arc<CapsuleRegistry>,
    /// Time-lock cipher
    pub cipher: Arc<TimeLockCipher>,
    /// Content store
    pub store: Arc<ContentStore>,
    /// Verification pipeline
    pub pipeline: Arc<VerificationPipeline>,
    /// Ledger clock for remaining-time estimates
    pub ledger: Arc<dyn LedgerClockEffects>,
    /// Block interval for height estimates
    pub block_time_secs: u64,
    /// Audit trail
    pub audit: Arc<AuditLog>,
}

/// Serialized, all-or-nothing unlock
pub struct UnlockOrchestrator {
    registry: Arc<CapsuleRegistry>,
    cipher: Arc<TimeLockCipher>,
    store: Arc<ContentStore>,
    pipeline: Arc<VerificationPipeline>,
    ledger: Arc<dyn LedgerClockEffects>,
    block_time_secs: u64,
    audit: Arc<AuditLog>,
    locks: KeyedLocks,
    unlocked: RwLock<HashMap<CapsuleId, CachedUnlock>>,
    unlock_transitions: AtomicUsize,
}

impl UnlockOrchestrator {
    /// Assemble from collaborators
    pub fn new(parts: OrchestratorParts) -> Self {
        Self {
            registry: parts.registry,
            cipher: parts.cipher,
            store: parts.store,
            pipeline: parts.pipeline,
            ledger: parts.ledger,
            block_time_secs: parts.block_time_secs,
            audit: parts.audit,
            locks: KeyedLocks::new(),
            unlocked: RwLock::new(HashMap::new()),
            unlock_transitions: AtomicUsize::new(0),
        }
    }

    /// Number of `Unlockable → Unlocked` transitions performed
    pub fn unlock_transitions(&self) -> usize {
        self.unlock_transitions.load(Ordering::SeqCst)
    }

    /// Cached content for the recipient, a rejection for anyone else, `None` on a miss
    fn serve_cached(
        &self,
        id: CapsuleId,
        requester: &Identity,
    ) -> Option<Result<DecryptedContent>> {
        let cached = self.unlocked.read().get(&id).cloned()?;
        if !requester.matches(&cached.recipient) {
            return Some(Err(self.reject_requester(id, requester)));
        }
        self.record(id, requester, AuditOutcome::AlreadyUnlocked, Vec::new());
        Some(Ok(cached.content))
    }

    fn remember(&self, recipient: &Identity, content: &DecryptedContent) {
        self.unlocked.write().insert(
            content.capsule_id,
            CachedUnlock {
                recipient: recipient.clone(),
                content: content.clone(),
            },
        );
    }

    /// Refusal for a requester that is not the recipient of an unlocked capsule
    fn reject_requester(&self, id: CapsuleId, requester: &Identity) -> CapsuleError {
        let reasons = vec![format!(
            "{}: {requester} is not the recipient of {id}",
            AuthorizationValidator::NAME
        )];
        warn!(capsule = %id, requester = %requester, "Unlocked content requested by non-recipient");
        self.record(
            id,
            requester,
            AuditOutcome::Rejected {
                reasons: reasons.clone(),
            },
            Vec::new(),
        );
        CapsuleError::VerificationFailed { reasons }
    }

    /// Attempt to unlock a capsule on behalf of `requester`
    pub async fn attempt_unlock(
        &self,
        id: CapsuleId,
        requester: Identity,
    ) -> Result<DecryptedContent> {
        if let Some(outcome) = self.serve_cached(id, &requester) {
            debug!(capsule = %id, "Answered from unlock cache");
            return outcome;
        }

        let _guard = self.locks.acquire(id).await;
        if let Some(outcome) = self.serve_cached(id, &requester) {
            debug!(capsule = %id, "Unlocked by a concurrent attempt");
            return outcome;
        }

        let capsule = self.registry.get(id)?;
        match capsule.state() {
            CapsuleState::Unlocked => return self.recover_unlocked(&capsule, &requester).await,
            CapsuleState::Created => {
                return Err(CapsuleError::invalid(format!("{id} has not been sealed")))
            }
            CapsuleState::Locked => match self.promote_if_ready(&capsule).await? {
                ConditionStatus::Satisfied => {}
                ConditionStatus::Pending(remaining) => {
                    self.record(
                        id,
                        &requester,
                        AuditOutcome::NotYetUnlockable { remaining },
                        Vec::new(),
                    );
                    return Err(CapsuleError::NotYetUnlockable { remaining });
                }
                ConditionStatus::Expired => {
                    self.record(id, &requester, AuditOutcome::Expired, Vec::new());
                    return Err(CapsuleError::LockExpired {
                        condition: capsule.condition,
                    });
                }
            },
            CapsuleState::UnlockFailed => {
                self.registry
                    .transition(id, CapsuleState::Unlockable)
                    .await?;
            }
            CapsuleState::Unlockable => {}
        }

        let context = self.context(&capsule, requester.clone())?;
        let decision = self.pipeline.verify(&context).await;
        if !decision.approved {
            warn!(capsule = %id, reasons = ?decision.reasons, "Unlock rejected");
            self.record(
                id,
                &requester,
                AuditOutcome::Rejected {
                    reasons: decision.reasons.clone(),
                },
                decision.results,
            );
            return Err(CapsuleError::VerificationFailed {
                reasons: decision.reasons,
            });
        }

        let content = match self.open(&capsule).await {
            Ok(content) => content,
            Err(err) => {
                self.fail_attempt(id, &err).await;
                self.record(
                    id,
                    &requester,
                    AuditOutcome::Failed {
                        error: err.to_string(),
                    },
                    decision.results,
                );
                return Err(err);
            }
        };

        self.registry.transition(id, CapsuleState::Unlocked).await?;
        self.unlock_transitions.fetch_add(1, Ordering::SeqCst);
        self.remember(&capsule.recipient, &content);
        self.record(id, &requester, AuditOutcome::Unlocked, decision.results);
        info!(capsule = %id, bytes = content.bytes.len(), "Capsule unlocked");
        Ok(content)
    }

    /// Current status, promoting `Locked` to `Unlockable` when the condition holds
    pub async fn status(&self, id: CapsuleId) -> Result<CapsuleStatus> {
        let mut capsule = self.registry.get(id)?;
        let mut remaining = None;
        let mut expired = false;

        match capsule.state() {
            CapsuleState::Locked => {
                let _guard = self.locks.acquire(id).await;
                capsule = self.registry.get(id)?;
                if capsule.state() == CapsuleState::Locked {
                    match self.promote_if_ready(&capsule).await? {
                        ConditionStatus::Satisfied => capsule = self.registry.get(id)?,
                        ConditionStatus::Pending(r) => remaining = Some(r),
                        ConditionStatus::Expired => expired = true,
                    }
                }
            }
            CapsuleState::Created => {
                let reading = self
                    .ledger
                    .reading()
                    .await
                    .map_err(|e| CapsuleError::internal(e.to_string()))?;
                remaining = capsule.condition.remaining(&reading, self.block_time_secs);
            }
            _ => {}
        }

        Ok(CapsuleStatus {
            capsule_id: id,
            state: capsule.state(),
            condition: capsule.condition,
            remaining,
            expired,
            content_id: capsule.content_id().map(ToString::to_string),
            size: capsule.size,
            content_type: capsule.content_type.clone(),
        })
    }

    /// Move `Locked` to `Unlockable` once the lock backend reports the condition met
    async fn promote_if_ready(&self, capsule: &Capsule) -> Result<ConditionStatus> {
        let handle = capsule
            .key()
            .map(|key| key.handle)
            .ok_or_else(|| CapsuleError::internal(format!("{} has no lock handle", capsule.id)))?;

        let status = self.cipher.check_condition(&handle).await?;
        match status {
            ConditionStatus::Satisfied => {
                self.registry
                    .transition(capsule.id, CapsuleState::Unlockable)
                    .await?;
                info!(capsule = %capsule.id, "Unlock condition reached");
            }
            ConditionStatus::Pending(remaining) => {
                debug!(capsule = %capsule.id, %remaining, "Unlock condition pending");
            }
            ConditionStatus::Expired => {
                warn!(capsule = %capsule.id, "Time lock expired before release");
            }
        }
        Ok(status)
    }

    fn context(&self, capsule: &Capsule, requester: Identity) -> Result<VerificationContext> {
        let key = capsule
            .key()
            .ok_or_else(|| CapsuleError::internal(format!("{} has no lock handle", capsule.id)))?;
        Ok(VerificationContext {
            capsule_id: capsule.id,
            requester,
            recipient: capsule.recipient.clone(),
            condition: capsule.condition,
            lock_handle: key.handle,
        })
    }

    /// Release, fetch, verify and decrypt; no state changes
    async fn open(&self, capsule: &Capsule) -> Result<DecryptedContent> {
        let (key, content_id) = match (capsule.key(), capsule.content_id()) {
            (Some(key), Some(content_id)) => (key, content_id),
            _ => {
                return Err(CapsuleError::internal(format!(
                    "{} is missing sealing data",
                    capsule.id
                )))
            }
        };

        let secret = self.cipher.release(&key.handle).await?;
        let material = DecryptionMaterial::from_parts(&secret, key.payload_nonce)?;
        drop(secret);

        let fetched = self
            .store
            .fetch_verified(content_id, Some(capsule.size + TAG_LEN as u64))
            .await?;
        debug!(capsule = %capsule.id, gateway = %fetched.gateway, "Ciphertext retrieved");

        let plaintext = open_payload(&material, &fetched.bytes);
        drop(material);
        let plaintext = plaintext.map_err(|err| {
            error!(capsule = %capsule.id, error = %err, "Decryption failed with released key");
            err
        })?;

        Ok(DecryptedContent {
            capsule_id: capsule.id,
            title: capsule.title.clone(),
            content_type: capsule.content_type.clone(),
            bytes: plaintext.into(),
        })
    }

    /// Unlocked in the registry but not in this process's cache
    async fn recover_unlocked(
        &self,
        capsule: &Capsule,
        requester: &Identity,
    ) -> Result<DecryptedContent> {
        if !requester.matches(&capsule.recipient) {
            return Err(self.reject_requester(capsule.id, requester));
        }
        let content = self.open(capsule).await?;
        self.remember(&capsule.recipient, &content);
        self.record(capsule.id, requester, AuditOutcome::AlreadyUnlocked, Vec::new());
        Ok(content)
    }

    /// Mark the failure on the ledger and return to `Unlockable`
    async fn fail_attempt(&self, id: CapsuleId, err: &CapsuleError) {
        if err.is_integrity_incident() {
            error!(capsule = %id, error = %err, "Unlock failed with integrity incident");
        } else {
            warn!(capsule = %id, error = %err, "Unlock failed");
        }
        for next in [CapsuleState::UnlockFailed, CapsuleState::Unlockable] {
            if let Err(commit_err) = self.registry.transition(id, next).await {
                warn!(capsule = %id, to = %next, error = %commit_err, "Could not record failed attempt");
                break;
            }
        }
    }

    fn record(
        &self,
        capsule_id: CapsuleId,
        requester: &Identity,
        outcome: AuditOutcome,
        results: Vec<VerificationResult>,
    ) {
        self.audit.record(AuditEntry {
            capsule_id,
            requester: requester.clone(),
            outcome,
            results,
        });
    }
}

impl std::fmt::Debug for UnlockOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockOrchestrator")
            .field("unlock_transitions", &self.unlock_transitions())
            .field("cached", &self.unlocked.read().len())
            .finish_non_exhaustive()
    }
}
