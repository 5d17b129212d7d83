//! Requester must be the recorded recipient

use crate::result::{ValidatorCost, VerificationResult};
use crate::validator::{Validator, VerificationContext};
use async_trait::async_trait;

/// Passes iff the requester is the capsule's recipient
///
/// Address-like identities compare case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationValidator;

impl AuthorizationValidator {
    /// Validator name
    pub const NAME: &'static str = "authorization";
}

#[async_trait]
impl Validator for AuthorizationValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn cost(&self) -> ValidatorCost {
        ValidatorCost::Cheap
    }

    fn mandatory(&self) -> bool {
        true
    }

    async fn validate(&self, context: &VerificationContext) -> VerificationResult {
        let evidence = format!("{}|{}", context.requester, context.recipient);
        let result = if context.requester.matches(&context.recipient) {
            VerificationResult::pass(Self::NAME, "requester is the recipient")
        } else {
            VerificationResult::fail(
                Self::NAME,
                format!("{} is not the recipient of {}", context.requester, context.capsule_id),
            )
        };
        result.with_evidence(evidence.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsule_core::{CapsuleId, Identity, UnlockCondition};
    use capsule_timelock::LockHandle;

    fn context(requester: &str, recipient: &str) -> VerificationContext {
        VerificationContext {
            capsule_id: CapsuleId::new(1),
            requester: Identity::from(requester),
            recipient: Identity::from(recipient),
            condition: UnlockCondition::at_timestamp(0),
            lock_handle: LockHandle::new(),
        }
    }

    #[tokio::test]
    async fn test_address_case_is_ignored() {
        let result = AuthorizationValidator
            .validate(&context("0xABCDEF", "0xabcdef"))
            .await;
        assert!(result.passed);
        assert!(result.evidence.is_some());
    }

    #[tokio::test]
    async fn test_other_identity_fails() {
        let result = AuthorizationValidator
            .validate(&context("0x1234", "0xabcdef"))
            .await;
        assert!(!result.passed);
        assert!(result.reason().starts_with("authorization: "));
    }

    #[tokio::test]
    async fn test_non_address_identities_are_exact() {
        assert!(!AuthorizationValidator.validate(&context("Alice", "alice")).await.passed);
    }
}
