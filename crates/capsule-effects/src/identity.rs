//! Identity handler

use async_trait::async_trait;
use capsule_core::effects::IdentityEffects;
use capsule_core::Identity;
use parking_lot::RwLock;

/// Identity provider holding a single configured account
///
/// The account can be switched at runtime, which is how a wallet reports that
/// the user changed accounts.
#[derive(Debug)]
pub struct StaticIdentityHandler {
    identity: RwLock<Identity>,
}

impl StaticIdentityHandler {
    /// Create a provider for the given identity
    pub fn new(identity: impl Into<Identity>) -> Self {
        Self {
            identity: RwLock::new(identity.into()),
        }
    }

    /// Switch to another identity
    pub fn switch_to(&self, identity: impl Into<Identity>) {
        *self.identity.write() = identity.into();
    }
}

#[async_trait]
impl IdentityEffects for StaticIdentityHandler {
    async fn current_identity(&self) -> Identity {
        self.identity.read().clone()
    }
}
