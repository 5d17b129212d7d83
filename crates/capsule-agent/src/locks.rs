//! Per-capsule exclusive locks
//!
//! One async mutex per capsule identifier, created on first use. Attempts on
//! different capsules never contend.

use capsule_core::CapsuleId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Exclusive lock keyed by capsule
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<CapsuleId, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a capsule
    pub async fn acquire(&self, id: CapsuleId) -> OwnedMutexGuard<()> {
        let lock = self.locks.lock().entry(id).or_default().clone();
        lock.lock_owned().await
    }

    /// Number of capsules that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Whether no capsule has been locked yet
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
