//! Verification pipeline
//!
//! Cheap validators run first, in registration order; the first cheap failure
//! skips the remaining cheap validators. Expensive validators always run, all at
//! once, so the audit trail carries their evidence even when the decision is
//! already negative.

use crate::result::{UnlockDecision, ValidatorCost, VerificationResult};
use crate::validator::{Validator, VerificationContext};
use crate::validators::{AuthorizationValidator, ConditionValidator, TimeConsensusValidator};
use capsule_core::effects::{LedgerClockEffects, TimeSourceEffects};
use capsule_core::{ReductionPolicy, VerificationConfig};
use capsule_timelock::TimeLockCipher;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered set of validators with a reduction policy
pub struct VerificationPipeline {
    validators: Vec<Arc<dyn Validator>>,
    reduction: ReductionPolicy,
}

impl VerificationPipeline {
    /// Empty pipeline
    pub fn new(reduction: ReductionPolicy) -> Self {
        Self {
            validators: Vec::new(),
            reduction,
        }
    }

    /// Authorization, time consensus and condition validators
    pub fn standard(
        config: &VerificationConfig,
        ledger: Arc<dyn LedgerClockEffects>,
        sources: Vec<Arc<dyn TimeSourceEffects>>,
        cipher: Arc<TimeLockCipher>,
    ) -> Self {
        Self::new(config.reduction)
            .with_validator(Arc::new(AuthorizationValidator))
            .with_validator(Arc::new(TimeConsensusValidator::new(
                ledger,
                sources,
                config.clone(),
            )))
            .with_validator(Arc::new(ConditionValidator::new(cipher)))
    }

    /// Register a validator
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Registered validator names, in registration order
    pub fn validator_names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Run every validator and reduce to a decision
    pub async fn verify(&self, context: &VerificationContext) -> UnlockDecision {
        let mut results = Vec::with_capacity(self.validators.len());
        let mut mandatory = Vec::new();

        let mut cheap_failed = false;
        for validator in self.of_cost(ValidatorCost::Cheap) {
            let result = if cheap_failed {
                VerificationResult::skipped(validator.name())
            } else {
                validator.validate(context).await
            };
            cheap_failed |= !result.passed;
            if validator.mandatory() {
                mandatory.push(results.len());
            }
            results.push(result);
        }

        let expensive: Vec<_> = self.of_cost(ValidatorCost::Expensive).collect();
        let outcomes = join_all(expensive.iter().map(|v| v.validate(context))).await;
        for (validator, result) in expensive.into_iter().zip(outcomes) {
            if validator.mandatory() {
                mandatory.push(results.len());
            }
            results.push(result);
        }

        let passing = results.iter().filter(|r| r.passed).count();
        let mandatory_ok = mandatory.iter().all(|&i| results[i].passed);
        let approved = match self.reduction {
            ReductionPolicy::Unanimous => passing == results.len(),
            ReductionPolicy::Quorum { min_passing } => mandatory_ok && passing >= min_passing,
        };
        let reasons: Vec<String> = results
            .iter()
            .filter(|r| !r.passed && !r.skipped)
            .map(VerificationResult::reason)
            .collect();

        for result in &results {
            debug!(
                capsule = %context.capsule_id,
                validator = %result.validator,
                passed = result.passed,
                skipped = result.skipped,
                detail = %result.detail,
                "Validator result"
            );
        }
        info!(capsule = %context.capsule_id, approved, failures = reasons.len(), "Verification complete");

        UnlockDecision {
            approved,
            results,
            reasons,
        }
    }

    fn of_cost(&self, cost: ValidatorCost) -> impl Iterator<Item = &Arc<dyn Validator>> {
        self.validators.iter().filter(move |v| v.cost() == cost)
    }
}

impl std::fmt::Debug for VerificationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationPipeline")
            .field("validators", &self.validator_names())
            .field("reduction", &self.reduction)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use capsule_core::{CapsuleId, Identity, UnlockCondition};
    use capsule_timelock::LockHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        cost: ValidatorCost,
        passes: bool,
        runs: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, cost: ValidatorCost, passes: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                cost,
                passes,
                runs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Validator for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn cost(&self) -> ValidatorCost {
            self.cost
        }

        async fn validate(&self, _context: &VerificationContext) -> VerificationResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.passes {
                VerificationResult::pass(self.name, "ok")
            } else {
                VerificationResult::fail(self.name, "no")
            }
        }
    }

    fn context(requester: &str) -> VerificationContext {
        VerificationContext {
            capsule_id: CapsuleId::new(1),
            requester: Identity::from(requester),
            recipient: Identity::from("0xaa"),
            condition: UnlockCondition::at_timestamp(0),
            lock_handle: LockHandle::new(),
        }
    }

    #[tokio::test]
    async fn test_cheap_failure_skips_cheap_but_runs_expensive() {
        let later_cheap = Fixed::new("format", ValidatorCost::Cheap, true);
        let network = Fixed::new("network", ValidatorCost::Expensive, true);
        let pipeline = VerificationPipeline::new(ReductionPolicy::Unanimous)
            .with_validator(Arc::new(AuthorizationValidator))
            .with_validator(network.clone())
            .with_validator(later_cheap.clone());

        let decision = pipeline.verify(&context("0xbb")).await;
        assert!(!decision.approved);
        assert_eq!(decision.failed_validators(), vec!["authorization"]);
        assert_eq!(decision.reasons.len(), 1);
        assert!(decision.result("format").map(|r| r.skipped).unwrap_or(false));
        assert_eq!(later_cheap.runs.load(Ordering::SeqCst), 0);
        assert_eq!(network.runs.load(Ordering::SeqCst), 1);
        assert_eq!(
            decision.results.iter().map(|r| r.validator.as_str()).collect::<Vec<_>>(),
            vec!["authorization", "format", "network"]
        );
    }

    #[tokio::test]
    async fn test_every_failure_is_a_reason() {
        let pipeline = VerificationPipeline::new(ReductionPolicy::Unanimous)
            .with_validator(Fixed::new("a", ValidatorCost::Expensive, false))
            .with_validator(Fixed::new("b", ValidatorCost::Expensive, false))
            .with_validator(Fixed::new("c", ValidatorCost::Expensive, true));
        let decision = pipeline.verify(&context("0xaa")).await;
        assert!(!decision.approved);
        assert_eq!(decision.reasons, vec!["a: no", "b: no"]);
    }

    #[tokio::test]
    async fn test_quorum_never_outvotes_authorization() {
        let pipeline = VerificationPipeline::new(ReductionPolicy::Quorum { min_passing: 2 })
            .with_validator(Arc::new(AuthorizationValidator))
            .with_validator(Fixed::new("x", ValidatorCost::Expensive, true))
            .with_validator(Fixed::new("y", ValidatorCost::Expensive, true))
            .with_validator(Fixed::new("z", ValidatorCost::Expensive, false));

        assert!(pipeline.verify(&context("0xAA")).await.approved);
        assert!(!pipeline.verify(&context("0xbb")).await.approved);
    }

    #[tokio::test]
    async fn test_empty_pipeline_approves() {
        let pipeline = VerificationPipeline::new(ReductionPolicy::Unanimous);
        assert!(pipeline.verify(&context("0xaa")).await.approved);
    }
}
