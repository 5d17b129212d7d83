//! Serialization of concurrent unlock attempts

mod common;

use capsule_core::CapsuleState;
use capsule_testkit::{recipient, GatewayMode};
use common::{harness, PAYLOAD};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_attempts_unlock_once() {
    let h = Arc::new(harness());
    let id = h.capsule_in(5).await;
    h.clock.advance_secs(5);
    // Widen the race window
    h.gateways[0].set_mode(GatewayMode::Slow(Duration::from_millis(50)));

    let attempts = (0..16).map(|_| {
        let h = h.clone();
        tokio::spawn(async move { h.service.attempt_unlock(id, recipient()).await })
    });
    let outcomes = join_all(attempts).await;

    for outcome in outcomes {
        let content = outcome.unwrap().unwrap();
        assert_eq!(&content.bytes[..], PAYLOAD);
    }
    assert_eq!(h.service.unlock_transitions(), 1);
    assert_eq!(h.beacon.release_count(), 1);
    assert_eq!(h.total_fetches(), 1);
    assert_eq!(
        h.service.registry().state(id).unwrap(),
        CapsuleState::Unlocked
    );

    let unlocked_commits = h
        .journal
        .operations_for(id)
        .into_iter()
        .filter(|op| {
            matches!(
                op,
                capsule_core::effects::CapsuleOperation::Transition {
                    to: CapsuleState::Unlocked,
                    ..
                }
            )
        })
        .count();
    assert_eq!(unlocked_commits, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_capsules_unlock_in_parallel() {
    let h = Arc::new(harness());
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(h.capsule_in(5).await);
    }
    h.clock.advance_secs(5);
    for gateway in &h.gateways {
        gateway.set_mode(GatewayMode::Slow(Duration::from_millis(100)));
    }

    let started = tokio::time::Instant::now();
    let attempts = ids.iter().map(|&id| {
        let h = h.clone();
        tokio::spawn(async move { h.service.attempt_unlock(id, recipient()).await })
    });
    for outcome in join_all(attempts).await {
        assert!(outcome.unwrap().is_ok());
    }

    assert!(started.elapsed() < Duration::from_millis(350));
    assert_eq!(h.service.unlock_transitions(), 4);
}
