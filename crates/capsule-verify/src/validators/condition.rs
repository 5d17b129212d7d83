//! Unlock condition must hold according to the time-lock backend

use crate::result::{ValidatorCost, VerificationResult};
use crate::validator::{Validator, VerificationContext};
use async_trait::async_trait;
use capsule_timelock::{ConditionStatus, TimeLockCipher};
use std::sync::Arc;

/// Passes iff the time lock reports `Satisfied`
#[derive(Debug, Clone)]
pub struct ConditionValidator {
    cipher: Arc<TimeLockCipher>,
}

impl ConditionValidator {
    /// Validator name
    pub const NAME: &'static str = "condition";

    /// Wrap a cipher
    pub fn new(cipher: Arc<TimeLockCipher>) -> Self {
        Self { cipher }
    }
}

#[async_trait]
impl Validator for ConditionValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn cost(&self) -> ValidatorCost {
        ValidatorCost::Expensive
    }

    async fn validate(&self, context: &VerificationContext) -> VerificationResult {
        match self.cipher.check_condition(&context.lock_handle).await {
            Ok(ConditionStatus::Satisfied) => {
                VerificationResult::pass(Self::NAME, format!("{} reached", context.condition))
            }
            Ok(ConditionStatus::Pending(remaining)) => VerificationResult::fail(
                Self::NAME,
                format!("{} pending, {remaining} remaining", context.condition),
            )
            .with_metric(remaining.approx_secs() as i64),
            Ok(ConditionStatus::Expired) => {
                VerificationResult::fail(Self::NAME, "time lock expired")
            }
            Err(err) => VerificationResult::fail(Self::NAME, err.to_string()),
        }
    }
}
