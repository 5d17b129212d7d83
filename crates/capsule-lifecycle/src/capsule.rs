//! Capsule record

use crate::state_machine::CapsuleStateMachine;
use capsule_core::{
    CapsuleError, CapsuleId, CapsuleState, ContentId, Identity, Result, UnlockCondition,
    NONCE_LEN,
};
use capsule_timelock::{LockHandle, TimeLockCiphertext};
use serde::{Deserialize, Serialize};

/// Time-locked payload key and the nonce needed with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEnvelope {
    /// Payload key sealed under the unlock condition
    pub ciphertext: TimeLockCiphertext,
    /// Handle for status and release
    pub handle: LockHandle,
    /// Nonce the payload was sealed with
    pub payload_nonce: [u8; NONCE_LEN],
}

/// Caller-supplied fields of a new capsule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCapsule {
    /// Creating account
    pub creator: Identity,
    /// Account allowed to unlock
    pub recipient: Identity,
    /// Display title
    pub title: String,
    /// When the capsule opens
    pub condition: UnlockCondition,
    /// Plaintext size in bytes
    pub size: u64,
    /// MIME-style content type tag
    pub content_type: String,
}

/// Append-only capsule record
///
/// `content_id` and `key` are write-once. State changes go through the
/// embedded state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    /// Identifier
    pub id: CapsuleId,
    /// Creating account
    pub creator: Identity,
    /// Account allowed to unlock
    pub recipient: Identity,
    /// Display title
    pub title: String,
    /// When the capsule opens
    pub condition: UnlockCondition,
    /// Plaintext size in bytes
    pub size: u64,
    /// MIME-style content type tag
    pub content_type: String,
    content_id: Option<ContentId>,
    key: Option<KeyEnvelope>,
    machine: CapsuleStateMachine,
}

impl Capsule {
    /// New record in `Created`
    pub fn new(id: CapsuleId, spec: NewCapsule) -> Self {
        Self {
            id,
            creator: spec.creator,
            recipient: spec.recipient,
            title: spec.title,
            condition: spec.condition,
            size: spec.size,
            content_type: spec.content_type,
            content_id: None,
            key: None,
            machine: CapsuleStateMachine::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> CapsuleState {
        self.machine.state()
    }

    /// States entered so far
    pub fn history(&self) -> &[CapsuleState] {
        self.machine.history()
    }

    /// Stored ciphertext identifier, once sealed
    pub fn content_id(&self) -> Option<&ContentId> {
        self.content_id.as_ref()
    }

    /// Time-locked key, once sealed
    pub fn key(&self) -> Option<&KeyEnvelope> {
        self.key.as_ref()
    }

    /// Record the content identifier; a different value after the first is rejected
    pub fn set_content_id(&mut self, content_id: ContentId) -> Result<()> {
        match self.content_id {
            Some(existing) if existing != content_id => Err(CapsuleError::ImmutableField {
                field: "content_id".to_string(),
            }),
            _ => {
                self.content_id = Some(content_id);
                Ok(())
            }
        }
    }

    /// Record the key envelope; a different value after the first is rejected
    pub fn set_key(&mut self, key: KeyEnvelope) -> Result<()> {
        match &self.key {
            Some(existing) if *existing != key => Err(CapsuleError::ImmutableField {
                field: "encrypted_key".to_string(),
            }),
            _ => {
                self.key = Some(key);
                Ok(())
            }
        }
    }

    /// Check a transition, including that sealing data is present before `Locked`
    pub fn check_transition(&self, to: CapsuleState) -> Result<()> {
        self.machine.check(to)?;
        if to == CapsuleState::Locked && (self.content_id.is_none() || self.key.is_none()) {
            return Err(CapsuleError::invalid(format!(
                "{} cannot lock before content and key are recorded",
                self.id
            )));
        }
        Ok(())
    }

    /// Apply a checked transition
    pub fn transition(&mut self, to: CapsuleState) -> Result<()> {
        self.check_transition(to)?;
        self.machine.apply(to)
    }
}
