//! End-to-end unlock scenarios

mod common;

use assert_matches::assert_matches;
use capsule_agent::AuditOutcome;
use capsule_core::effects::{CapsuleOperation, TimeSourceEffects};
use capsule_core::{
    CapsuleError, CapsuleState, ConsensusPolicy, Remaining, StorageOperation, UnlockCondition,
};
use capsule_testkit::{recipient, stranger, GatewayMode, ScriptedTimeSource, SourceMode};
use common::{harness, harness_with, test_config, PAYLOAD};
use std::sync::Arc;

#[tokio::test]
async fn test_create_seals_and_locks() {
    let h = harness();
    let id = h.capsule_in(60).await;

    assert_eq!(h.service.registry().state(id).unwrap(), CapsuleState::Locked);
    assert_eq!(h.uploader.upload_count(), 1);
    assert_eq!(h.beacon.lock_count(), 1);
    assert_eq!(h.network.len(), 1);

    let ops = h.journal.operations_for(id);
    assert_eq!(ops.len(), 2);
    assert_matches!(ops[0], CapsuleOperation::Create { .. });
    assert_matches!(ops[1], CapsuleOperation::Seal { .. });
}

#[tokio::test]
async fn test_stored_bytes_are_not_plaintext() {
    let h = harness();
    let id = h.capsule_in(60).await;
    let capsule = h.service.registry().get(id).unwrap();
    let stored = h
        .service
        .store()
        .get(capsule.content_id().unwrap())
        .await
        .unwrap();

    assert_ne!(stored, PAYLOAD);
    assert!(!stored.windows(16).any(|w| PAYLOAD.windows(16).any(|p| p == w)));
}

#[tokio::test]
async fn test_unlock_ten_seconds_out() {
    let h = harness();
    let id = h.capsule_in(10).await;

    let early = h.service.attempt_unlock(id, recipient()).await;
    assert_matches!(
        early,
        Err(CapsuleError::NotYetUnlockable {
            remaining: Remaining::Seconds(10)
        })
    );
    assert_eq!(h.service.registry().state(id).unwrap(), CapsuleState::Locked);
    assert_eq!(h.total_fetches(), 0);

    h.clock.advance_secs(11);
    let content = h.service.attempt_unlock(id, recipient()).await.unwrap();
    assert_eq!(&content.bytes[..], PAYLOAD);
    assert_eq!(content.content_type, "text/plain");
    assert_eq!(h.service.registry().state(id).unwrap(), CapsuleState::Unlocked);
}

#[tokio::test]
async fn test_repeat_unlock_is_cached() {
    let h = harness();
    let id = h.capsule_in(5).await;
    h.clock.advance_secs(5);

    let first = h.service.attempt_unlock(id, recipient()).await.unwrap();
    let fetches = h.total_fetches();
    let releases = h.beacon.release_count();
    let journal_len = h.journal.len();

    let second = h.service.attempt_unlock(id, recipient()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.total_fetches(), fetches);
    assert_eq!(h.beacon.release_count(), releases);
    assert_eq!(h.journal.len(), journal_len);
    assert_eq!(h.service.unlock_transitions(), 1);

    let audit = h.service.audit(id);
    assert_eq!(audit.last().unwrap().outcome, AuditOutcome::AlreadyUnlocked);
}

#[tokio::test]
async fn test_cached_unlock_still_checks_recipient() {
    let h = harness();
    let id = h.capsule_in(5).await;
    h.clock.advance_secs(5);
    h.service.attempt_unlock(id, recipient()).await.unwrap();
    let fetches = h.total_fetches();

    let err = h
        .service
        .attempt_unlock(id, stranger())
        .await
        .unwrap_err();
    assert_matches!(&err, CapsuleError::VerificationFailed { reasons } => {
        assert!(reasons[0].starts_with("authorization"));
    });
    assert_eq!(h.total_fetches(), fetches);

    let audit = h.service.audit(id);
    let last = audit.last().unwrap();
    assert_eq!(last.requester, stranger());
    assert_matches!(&last.outcome, AuditOutcome::Rejected { reasons } if !reasons.is_empty());
}

#[tokio::test]
async fn test_restarted_service_recovers_unlocked_content() {
    let h = harness();
    let id = h.capsule_in(5).await;
    h.clock.advance_secs(5);
    h.service.attempt_unlock(id, recipient()).await.unwrap();

    let restarted = h.restart();
    let err = restarted
        .attempt_unlock(id, stranger())
        .await
        .unwrap_err();
    assert_matches!(err, CapsuleError::VerificationFailed { .. });
    assert_matches!(
        restarted.audit(id).last().unwrap().outcome,
        AuditOutcome::Rejected { .. }
    );

    let content = restarted.attempt_unlock(id, recipient()).await.unwrap();
    assert_eq!(&content.bytes[..], PAYLOAD);
    assert_eq!(restarted.unlock_transitions(), 0);

    let audit = restarted.audit(id);
    let last = audit.last().unwrap();
    assert_eq!(last.outcome, AuditOutcome::AlreadyUnlocked);
    assert!(last.results.is_empty());
}

#[tokio::test]
async fn test_expired_lock_is_reported_and_audited() {
    let mut config = test_config();
    config.timelock.expiry_window_secs = Some(60);
    let h = harness_with(config, |_| Vec::new());
    let id = h.capsule_in(5).await;
    h.clock.advance_secs(100);

    let err = h
        .service
        .attempt_unlock(id, recipient())
        .await
        .unwrap_err();
    assert_matches!(err, CapsuleError::LockExpired { condition } => {
        assert_eq!(condition, h.service.registry().get(id).unwrap().condition);
    });
    assert_eq!(h.service.registry().state(id).unwrap(), CapsuleState::Locked);
    assert_eq!(h.beacon.release_count(), 0);
    assert_eq!(h.total_fetches(), 0);
    assert_eq!(h.service.audit(id).last().unwrap().outcome, AuditOutcome::Expired);

    let status = h.service.capsule_status(id).await.unwrap();
    assert!(status.expired);
    assert_eq!(status.state, CapsuleState::Locked);
}

#[tokio::test]
async fn test_stranger_is_rejected_without_state_change() {
    let h = harness();
    let id = h.capsule_in(5).await;
    h.clock.advance_secs(30);

    // Promote to Unlockable first
    h.service.capsule_status(id).await.unwrap();
    let err = h
        .service
        .attempt_unlock(id, stranger())
        .await
        .unwrap_err();

    assert_matches!(&err, CapsuleError::VerificationFailed { reasons } => {
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].starts_with("authorization"));
    });
    assert_eq!(
        h.service.registry().state(id).unwrap(),
        CapsuleState::Unlockable
    );
    assert_eq!(h.beacon.release_count(), 0);
    assert_eq!(h.total_fetches(), 0);

    let audit = h.service.audit(id);
    assert_matches!(&audit[0].outcome, AuditOutcome::Rejected { reasons } if !reasons.is_empty());
    assert_eq!(audit[0].requester, stranger());
}

#[tokio::test]
async fn test_storage_outage_is_retryable() {
    let h = harness();
    let id = h.capsule_in(5).await;
    h.clock.advance_secs(6);
    for gateway in &h.gateways {
        gateway.set_mode(GatewayMode::Down);
    }

    let err = h
        .service
        .attempt_unlock(id, recipient())
        .await
        .unwrap_err();
    assert_matches!(&err, CapsuleError::StorageUnavailable { operation: StorageOperation::Fetch, attempts } => {
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].gateway, "https://gw-a.test");
        assert_eq!(attempts[1].gateway, "https://gw-b.test");
    });
    assert!(err.is_transient());
    assert_eq!(
        h.service.registry().state(id).unwrap(),
        CapsuleState::Unlockable
    );
    assert_eq!(h.beacon.release_count(), 1);

    let history = h.service.registry().get(id).unwrap().history().to_vec();
    assert!(history.contains(&CapsuleState::UnlockFailed));

    for gateway in &h.gateways {
        gateway.set_mode(GatewayMode::Serve);
    }
    let content = h.service.attempt_unlock(id, recipient()).await.unwrap();
    assert_eq!(&content.bytes[..], PAYLOAD);
    assert_eq!(h.beacon.release_count(), 1);
    assert_eq!(h.service.registry().state(id).unwrap(), CapsuleState::Unlocked);
}

#[tokio::test]
async fn test_fallback_to_second_gateway() {
    let h = harness();
    let id = h.capsule_in(1).await;
    h.clock.advance_secs(1);
    h.gateways[0].set_mode(GatewayMode::Missing);

    let content = h.service.attempt_unlock(id, recipient()).await.unwrap();
    assert_eq!(&content.bytes[..], PAYLOAD);
    assert_eq!(h.gateways[0].fetch_count(), 1);
    assert_eq!(h.gateways[1].fetch_count(), 1);
}

#[tokio::test]
async fn test_tampered_content_is_an_incident() {
    let h = harness();
    let id = h.capsule_in(1).await;
    h.clock.advance_secs(1);
    h.gateways[0].set_mode(GatewayMode::Tamper);

    let err = h
        .service
        .attempt_unlock(id, recipient())
        .await
        .unwrap_err();
    assert_matches!(&err, CapsuleError::IntegrityViolation { endpoint: Some(endpoint), .. } => {
        assert_eq!(endpoint, "https://gw-a.test");
    });
    assert!(err.is_integrity_incident());
    assert!(!err.is_transient());
    assert_eq!(
        h.service.registry().state(id).unwrap(),
        CapsuleState::Unlockable
    );
    assert_matches!(
        &h.service.audit(id).last().unwrap().outcome,
        AuditOutcome::Failed { .. }
    );
}

#[tokio::test]
async fn test_offline_beacon_fails_create_loudly() {
    let h = harness();
    h.beacon.set_offline(true);

    let condition = UnlockCondition::at_timestamp(h.clock.timestamp() + 60);
    let err = h
        .service
        .create_capsule(h.request(condition))
        .await
        .unwrap_err();

    assert_matches!(err, CapsuleError::LockBackendUnavailable { .. });
    assert_eq!(h.uploader.upload_count(), 0);
    assert!(h.network.is_empty());
    assert!(h.service.registry().is_empty());
}

#[tokio::test]
async fn test_offline_beacon_at_unlock_leaves_capsule_locked() {
    let h = harness();
    let id = h.capsule_in(5).await;
    h.clock.advance_secs(5);
    h.beacon.set_offline(true);

    let err = h
        .service
        .attempt_unlock(id, recipient())
        .await
        .unwrap_err();
    assert_matches!(err, CapsuleError::LockBackendUnavailable { .. });
    assert_eq!(h.service.registry().state(id).unwrap(), CapsuleState::Locked);

    h.beacon.set_offline(false);
    assert!(h.service.attempt_unlock(id, recipient()).await.is_ok());
}

#[tokio::test]
async fn test_unknown_capsule_is_not_found() {
    let h = harness();
    let err = h
        .service
        .attempt_unlock(capsule_core::CapsuleId::new(42), recipient())
        .await
        .unwrap_err();
    assert_matches!(err, CapsuleError::NotFound { .. });
}

#[tokio::test]
async fn test_block_height_condition() {
    let h = harness();
    let condition = UnlockCondition::at_height(h.clock.height() + 3);
    let id = h
        .service
        .create_capsule(h.request(condition))
        .await
        .unwrap();

    let status = h.service.capsule_status(id).await.unwrap();
    assert_eq!(
        status.remaining,
        Some(Remaining::Blocks {
            blocks: 3,
            approx_secs: 36
        })
    );

    h.clock.advance_blocks(3);
    let content = h.service.attempt_unlock(id, recipient()).await.unwrap();
    assert_eq!(&content.bytes[..], PAYLOAD);
}

#[tokio::test]
async fn test_status_promotes_lazily() {
    let h = harness();
    let id = h.capsule_in(20).await;

    let status = h.service.capsule_status(id).await.unwrap();
    assert_eq!(status.state, CapsuleState::Locked);
    assert_eq!(status.remaining, Some(Remaining::Seconds(20)));
    assert!(!status.expired);
    assert_eq!(status.size, PAYLOAD.len() as u64);
    assert!(status.content_id.unwrap().starts_with('b'));

    h.clock.advance_secs(25);
    let status = h.service.capsule_status(id).await.unwrap();
    assert_eq!(status.state, CapsuleState::Unlockable);
    assert_eq!(status.remaining, None);
}

#[tokio::test]
async fn test_external_corroboration_required() {
    let mut config = test_config();
    config.verification.require_external_corroboration = true;
    config.verification.consensus = ConsensusPolicy::AtLeast(2);

    let h = harness_with(config, |_| Vec::new());
    let id = h.capsule_in(5).await;
    h.clock.advance_secs(10);
    let err = h
        .service
        .attempt_unlock(id, recipient())
        .await
        .unwrap_err();
    assert_matches!(&err, CapsuleError::VerificationFailed { reasons } => {
        assert!(reasons.iter().any(|r| r.starts_with("time_consensus")));
    });
    assert_eq!(
        h.service.registry().state(id).unwrap(),
        CapsuleState::Unlockable
    );
    assert_eq!(h.beacon.release_count(), 0);
}

#[tokio::test]
async fn test_external_source_corroborates_ledger() {
    let mut config = test_config();
    config.verification.require_external_corroboration = true;
    config.verification.consensus = ConsensusPolicy::AtLeast(2);

    let h = harness_with(config, |clock| {
        vec![Arc::new(
            ScriptedTimeSource::external("worldtime", clock.clone())
                .with_mode(SourceMode::Offset(-45)),
        ) as Arc<dyn TimeSourceEffects>]
    });

    let id = h.capsule_in(5).await;
    h.clock.advance_secs(10);
    let content = h.service.attempt_unlock(id, recipient()).await.unwrap();
    assert_eq!(&content.bytes[..], PAYLOAD);

    let audit = h.service.audit(id);
    let consensus = audit[0]
        .results
        .iter()
        .find(|r| r.validator == "time_consensus")
        .unwrap();
    assert!(consensus.passed);
    assert_eq!(consensus.metric, Some(-45));
}

#[tokio::test]
async fn test_dead_external_source_blocks_corroborated_unlock() {
    let mut config = test_config();
    config.verification.require_external_corroboration = true;

    let h = harness_with(config, |clock| {
        vec![Arc::new(
            ScriptedTimeSource::external("worldtime", clock.clone()).with_mode(SourceMode::Hang),
        ) as Arc<dyn TimeSourceEffects>]
    });

    let id = h.capsule_in(5).await;
    h.clock.advance_secs(10);
    let err = h
        .service
        .attempt_unlock(id, recipient())
        .await
        .unwrap_err();
    assert_matches!(err, CapsuleError::VerificationFailed { .. });
}
