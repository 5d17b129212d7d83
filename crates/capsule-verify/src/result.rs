//! Validator outcomes and the reduced unlock decision

use capsule_core::hash;
use serde::{Deserialize, Serialize};

/// How expensive a validator is to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidatorCost {
    /// Local checks; a failure skips the remaining cheap checks
    Cheap,
    /// Network-bound checks; always run and recorded
    Expensive,
}

/// Outcome of a single validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Validator name
    pub validator: String,
    /// Whether the check passed
    pub passed: bool,
    /// Whether the check was skipped after an earlier cheap failure
    pub skipped: bool,
    /// Human-readable explanation
    pub detail: String,
    /// Numeric confidence or diff, such as worst clock skew in seconds
    pub metric: Option<i64>,
    /// Hex SHA-256 digest of the evidence examined
    pub evidence: Option<String>,
}

impl VerificationResult {
    /// Passing result
    pub fn pass(validator: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(validator, true, detail)
    }

    /// Failing result
    pub fn fail(validator: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(validator, false, detail)
    }

    /// Not run because a cheaper check already failed
    pub fn skipped(validator: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::new(validator, false, "skipped after an earlier check failed")
        }
    }

    fn new(validator: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            passed,
            skipped: false,
            detail: detail.into(),
            metric: None,
            evidence: None,
        }
    }

    /// Attach a numeric metric
    pub fn with_metric(mut self, metric: i64) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Attach evidence; only its digest is kept
    pub fn with_evidence(mut self, evidence: &[u8]) -> Self {
        self.evidence = Some(hex::encode(hash::hash(evidence)));
        self
    }

    /// Reason line for a failing result
    pub fn reason(&self) -> String {
        format!("{}: {}", self.validator, self.detail)
    }
}

/// Reduced outcome of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockDecision {
    /// Whether the unlock may proceed
    pub approved: bool,
    /// Every validator's result, in execution order
    pub results: Vec<VerificationResult>,
    /// One reason per failing validator
    pub reasons: Vec<String>,
}

impl UnlockDecision {
    /// Names of validators that ran and failed
    pub fn failed_validators(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.passed && !r.skipped)
            .map(|r| r.validator.as_str())
            .collect()
    }

    /// Result for a validator by name
    pub fn result(&self, validator: &str) -> Option<&VerificationResult> {
        self.results.iter().find(|r| r.validator == validator)
    }
}
