//! Standard pipeline over a beacon lock and scripted clocks

use capsule_core::effects::TimeSourceEffects;
use capsule_core::{CapsuleId, TimeLockConfig, UnlockCondition, VerificationConfig};
use capsule_effects::SimulatedLedgerClock;
use capsule_testkit::{recipient, stranger, ScriptedTimeSource, SourceMode, T0};
use capsule_timelock::{BeaconTimeLock, TimeLockCipher};
use capsule_verify::{VerificationContext, VerificationPipeline};
use std::sync::Arc;

struct Fixture {
    clock: SimulatedLedgerClock,
    pipeline: VerificationPipeline,
    context: VerificationContext,
}

async fn fixture(unlock_in: u64) -> Fixture {
    capsule_testkit::init_test_tracing();
    let clock = SimulatedLedgerClock::new(T0, 0);
    let beacon = Arc::new(BeaconTimeLock::new(Arc::new(clock.clone()), 12));
    let cipher = Arc::new(TimeLockCipher::new(beacon, TimeLockConfig::default()));
    let condition = UnlockCondition::at_timestamp(T0 + unlock_in);
    let (_, lock_handle) = cipher.lock(&[4u8; 32], condition).await.unwrap();

    let external: Arc<dyn TimeSourceEffects> = Arc::new(
        ScriptedTimeSource::external("worldtime", clock.clone()).with_mode(SourceMode::Offset(-20)),
    );
    let config = VerificationConfig {
        source_timeout_ms: 100,
        ..VerificationConfig::default()
    };
    let pipeline =
        VerificationPipeline::standard(&config, Arc::new(clock.clone()), vec![external], cipher);

    Fixture {
        clock,
        pipeline,
        context: VerificationContext {
            capsule_id: CapsuleId::new(1),
            requester: recipient(),
            recipient: recipient(),
            condition,
            lock_handle,
        },
    }
}

#[tokio::test]
async fn test_registration_order() {
    let f = fixture(10).await;
    assert_eq!(
        f.pipeline.validator_names(),
        vec!["authorization", "time_consensus", "condition"]
    );
}

#[tokio::test]
async fn test_rejects_before_condition_and_approves_after() {
    let f = fixture(10).await;
    let early = f.pipeline.verify(&f.context).await;
    assert!(!early.approved);
    assert_eq!(early.failed_validators(), vec!["condition"]);

    f.clock.advance_secs(11);
    let decision = f.pipeline.verify(&f.context).await;
    assert!(decision.approved, "{:?}", decision.reasons);
    assert!(decision.results.iter().all(|r| r.evidence.is_some() || r.validator == "condition"));
}

#[tokio::test]
async fn test_stranger_still_gets_full_audit_trail() {
    let f = fixture(0).await;
    let context = VerificationContext {
        requester: stranger(),
        ..f.context.clone()
    };
    let decision = f.pipeline.verify(&context).await;
    assert!(!decision.approved);
    assert_eq!(decision.failed_validators(), vec!["authorization"]);
    assert_eq!(decision.results.len(), 3);
    assert!(decision.result("time_consensus").map(|r| r.passed).unwrap_or(false));
    assert!(decision.result("condition").map(|r| r.passed).unwrap_or(false));
}
