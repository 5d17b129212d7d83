//! Time consensus across the ledger clock and external reference clocks
//!
//! The ledger clock is the reference and always counts as a valid source while
//! it is reachable. Every other source is queried concurrently under its own
//! timeout and is valid when its skew from the ledger is within the tolerance
//! for its kind and, for timestamp conditions, when it reads no earlier than
//! the condition's corroboration floor.

use crate::result::{ValidatorCost, VerificationResult};
use crate::validator::{Validator, VerificationContext};
use async_trait::async_trait;
use capsule_core::effects::{LedgerClockEffects, SourceKind, TimeSourceEffects};
use capsule_core::VerificationConfig;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// What one source reported during a consensus round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceObservation {
    /// Source name
    pub source: String,
    /// Source kind
    pub kind: SourceKind,
    /// Reported Unix seconds
    pub reading: Option<u64>,
    /// Reading minus ledger time
    pub skew_secs: Option<i64>,
    /// Whether the source counts toward consensus
    pub valid: bool,
    /// Why the source did not count
    pub error: Option<String>,
}

/// Requires enough independent clocks to agree with the ledger
pub struct TimeConsensusValidator {
    ledger: Arc<dyn LedgerClockEffects>,
    sources: Vec<Arc<dyn TimeSourceEffects>>,
    config: VerificationConfig,
}

impl TimeConsensusValidator {
    /// Validator name
    pub const NAME: &'static str = "time_consensus";

    /// Name the ledger reference appears under in observations
    pub const LEDGER_SOURCE: &'static str = "ledger";

    /// Create a validator over the ledger clock and additional sources
    pub fn new(
        ledger: Arc<dyn LedgerClockEffects>,
        sources: Vec<Arc<dyn TimeSourceEffects>>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            ledger,
            sources,
            config,
        }
    }

    fn tolerance(&self, kind: SourceKind) -> u64 {
        match kind {
            SourceKind::Authoritative => self.config.authoritative_tolerance_secs,
            SourceKind::External => self.config.external_tolerance_secs,
        }
    }

    async fn observe(
        &self,
        source: &Arc<dyn TimeSourceEffects>,
        reference: u64,
        floor: Option<u64>,
    ) -> SourceObservation {
        let mut observation = SourceObservation {
            source: source.name().to_string(),
            kind: source.kind(),
            reading: None,
            skew_secs: None,
            valid: false,
            error: None,
        };

        let reading = match tokio::time::timeout(self.config.source_timeout(), source.now()).await
        {
            Ok(Ok(reading)) => reading,
            Ok(Err(err)) => {
                observation.error = Some(err.to_string());
                return observation;
            }
            Err(_) => {
                observation.error = Some(format!(
                    "timed out after {}ms",
                    self.config.source_timeout_ms
                ));
                return observation;
            }
        };

        let skew = reading as i64 - reference as i64;
        observation.reading = Some(reading);
        observation.skew_secs = Some(skew);

        let tolerance = self.tolerance(observation.kind);
        if skew.unsigned_abs() > tolerance {
            observation.error = Some(format!("skew {skew}s exceeds {tolerance}s"));
        } else if let Some(floor) = floor.filter(|floor| reading < *floor) {
            observation.error = Some(format!("reads {reading}, before {floor}"));
        } else {
            observation.valid = true;
        }
        observation
    }

    /// Query every source and return the observations, ledger first
    pub async fn observe_all(
        &self,
        context: &VerificationContext,
    ) -> Result<Vec<SourceObservation>, String> {
        let reference = match tokio::time::timeout(
            self.config.source_timeout(),
            self.ledger.current_timestamp(),
        )
        .await
        {
            Ok(Ok(reference)) => reference,
            Ok(Err(err)) => return Err(format!("ledger clock unavailable: {err}")),
            Err(_) => {
                return Err(format!(
                    "ledger clock timed out after {}ms",
                    self.config.source_timeout_ms
                ))
            }
        };

        let floor = context.condition.corroboration_floor();
        let mut observations = vec![SourceObservation {
            source: Self::LEDGER_SOURCE.to_string(),
            kind: SourceKind::Authoritative,
            reading: Some(reference),
            skew_secs: Some(0),
            valid: true,
            error: None,
        }];
        observations.extend(
            join_all(
                self.sources
                    .iter()
                    .map(|source| self.observe(source, reference, floor)),
            )
            .await,
        );
        Ok(observations)
    }
}

#[async_trait]
impl Validator for TimeConsensusValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn cost(&self) -> ValidatorCost {
        ValidatorCost::Expensive
    }

    async fn validate(&self, context: &VerificationContext) -> VerificationResult {
        let observations = match self.observe_all(context).await {
            Ok(observations) => observations,
            Err(reason) => {
                warn!(capsule = %context.capsule_id, reason = %reason, "Time consensus without reference");
                return VerificationResult::fail(Self::NAME, reason);
            }
        };

        for observation in observations.iter().filter(|o| !o.valid) {
            debug!(
                capsule = %context.capsule_id,
                source = %observation.source,
                error = ?observation.error,
                "Time source not counted"
            );
        }

        let total = observations.len();
        let valid = observations.iter().filter(|o| o.valid).count();
        let external_valid = observations
            .iter()
            .filter(|o| o.valid && o.kind == SourceKind::External)
            .count();
        let worst_skew = observations
            .iter()
            .filter_map(|o| o.skew_secs)
            .max_by_key(|skew| skew.unsigned_abs())
            .unwrap_or(0);
        let evidence = serde_json::to_vec(&observations).unwrap_or_default();

        let result = if !self.config.consensus.is_satisfied(valid, total) {
            VerificationResult::fail(
                Self::NAME,
                format!(
                    "{valid}/{total} sources valid, policy {:?} not met",
                    self.config.consensus
                ),
            )
        } else if self.config.require_external_corroboration && external_valid == 0 {
            VerificationResult::fail(
                Self::NAME,
                format!("{valid}/{total} sources valid, no external source corroborates"),
            )
        } else {
            VerificationResult::pass(
                Self::NAME,
                format!("{valid}/{total} sources valid, {external_valid} external"),
            )
        };
        result.with_metric(worst_skew).with_evidence(&evidence)
    }
}

impl std::fmt::Debug for TimeConsensusValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeConsensusValidator")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("consensus", &self.config.consensus)
            .finish_non_exhaustive()
    }
}
