//! Capsule lifecycle state machine
//!
//! ```text
//! Created → Locked → Unlockable → Unlocked
//!                       ↓    ↑
//!                    UnlockFailed
//! ```
//!
//! - States only move forward; `UnlockFailed` is the one back edge and it
//!   always returns to `Unlockable`, so a failed unlock is retryable
//! - `Unlocked` is terminal
//! - A rejected transition leaves the state untouched

use capsule_core::{CapsuleError, CapsuleState, Result};
use serde::{Deserialize, Serialize};

/// Whether `from → to` is in the transition table
pub fn can_transition(from: CapsuleState, to: CapsuleState) -> bool {
    use CapsuleState::*;

    matches!(
        (from, to),
        (Created, Locked)
            | (Locked, Unlockable)
            | (Unlockable, Unlocked)
            | (Unlockable, UnlockFailed)
            | (UnlockFailed, Unlockable)
    )
}

/// Current state plus the path that led to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleStateMachine {
    state: CapsuleState,
    history: Vec<CapsuleState>,
}

impl CapsuleStateMachine {
    /// Machine in `Created`
    pub fn new() -> Self {
        Self {
            state: CapsuleState::Created,
            history: vec![CapsuleState::Created],
        }
    }

    /// Current state
    pub fn state(&self) -> CapsuleState {
        self.state
    }

    /// Every state entered, oldest first
    pub fn history(&self) -> &[CapsuleState] {
        &self.history
    }

    /// Check a transition without applying it
    pub fn check(&self, to: CapsuleState) -> Result<()> {
        if can_transition(self.state, to) {
            Ok(())
        } else {
            Err(CapsuleError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Apply a transition
    pub fn apply(&mut self, to: CapsuleState) -> Result<()> {
        self.check(to)?;
        self.state = to;
        self.history.push(to);
        Ok(())
    }
}

impl Default for CapsuleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
