//! Wallet identity provider

use crate::identifiers::Identity;
use async_trait::async_trait;
use std::sync::Arc;

/// Supplies the identity of the local user; private keys stay with the wallet
#[async_trait]
pub trait IdentityEffects: Send + Sync {
    /// Identity currently selected in the wallet
    async fn current_identity(&self) -> Identity;
}

#[async_trait]
impl<T: IdentityEffects + ?Sized> IdentityEffects for Arc<T> {
    async fn current_identity(&self) -> Identity {
        (**self).current_identity().await
    }
}
