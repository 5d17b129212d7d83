//! Service wired to simulated collaborators

#![allow(dead_code)]

use capsule_agent::{CapsuleService, CreateCapsule};
use capsule_lifecycle::CapsuleRegistry;
use capsule_core::effects::{ContentGateway, ContentUploader, TimeSourceEffects};
use capsule_core::{CapsuleConfig, CapsuleId, RetryPolicy, UnlockCondition};
use capsule_effects::{
    JournalTransactionHandler, MemoryNetwork, SimulatedLedgerClock, StaticIdentityHandler,
};
use capsule_testkit::{creator, recipient, ScriptedGateway, ScriptedUploader, H0, T0};
use capsule_timelock::BeaconTimeLock;
use std::sync::Arc;
use std::time::Duration;

pub const PAYLOAD: &[u8] = b"Dear future self: the spare key is under the blue pot.";

pub struct Harness {
    pub clock: SimulatedLedgerClock,
    pub network: MemoryNetwork,
    pub gateways: Vec<Arc<ScriptedGateway>>,
    pub uploader: Arc<ScriptedUploader>,
    pub beacon: Arc<BeaconTimeLock>,
    pub journal: Arc<JournalTransactionHandler>,
    pub registry: Arc<CapsuleRegistry>,
    pub identity: Arc<StaticIdentityHandler>,
    pub config: CapsuleConfig,
    pub sources: Vec<Arc<dyn TimeSourceEffects>>,
    pub service: CapsuleService,
}

pub fn test_config() -> CapsuleConfig {
    let mut config = CapsuleConfig::default();
    config.store.gateway_timeout_ms = 200;
    config.store.fetch_deadline_ms = 1_000;
    config.store.upload_retry = RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(2);
    config.verification.source_timeout_ms = 200;
    config
}

pub fn harness() -> Harness {
    harness_with(test_config(), |_| Vec::new())
}

/// Harness whose external time sources are built over the shared ledger clock
pub fn harness_with<F>(config: CapsuleConfig, sources: F) -> Harness
where
    F: FnOnce(&SimulatedLedgerClock) -> Vec<Arc<dyn TimeSourceEffects>>,
{
    capsule_testkit::init_test_tracing();

    let clock = SimulatedLedgerClock::new(T0, H0);
    let sources = sources(&clock);
    let network = MemoryNetwork::new();
    let gateways: Vec<Arc<ScriptedGateway>> = ["https://gw-a.test", "https://gw-b.test"]
        .into_iter()
        .map(|endpoint| Arc::new(ScriptedGateway::new(endpoint, network.clone())))
        .collect();
    let uploader = Arc::new(ScriptedUploader::new("https://upload.test", network.clone()));
    let beacon = Arc::new(
        BeaconTimeLock::new(Arc::new(clock.clone()), config.ledger.block_time_secs)
            .with_expiry(config.timelock.expiry_window_secs),
    );
    let journal = Arc::new(JournalTransactionHandler::new());
    let registry = Arc::new(CapsuleRegistry::new(journal.clone()));
    let identity = Arc::new(StaticIdentityHandler::new(creator()));

    let service = build_service(
        &config,
        &clock,
        &gateways,
        &uploader,
        &beacon,
        &registry,
        &identity,
        sources.clone(),
    );

    Harness {
        clock,
        network,
        gateways,
        uploader,
        beacon,
        journal,
        registry,
        identity,
        config,
        sources,
        service,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_service(
    config: &CapsuleConfig,
    clock: &SimulatedLedgerClock,
    gateways: &[Arc<ScriptedGateway>],
    uploader: &Arc<ScriptedUploader>,
    beacon: &Arc<BeaconTimeLock>,
    registry: &Arc<CapsuleRegistry>,
    identity: &Arc<StaticIdentityHandler>,
    sources: Vec<Arc<dyn TimeSourceEffects>>,
) -> CapsuleService {
    CapsuleService::builder()
        .with_config(config.clone())
        .with_ledger(Arc::new(clock.clone()))
        .with_identity(identity.clone())
        .with_registry(registry.clone())
        .with_uploader(uploader.clone() as Arc<dyn ContentUploader>)
        .with_gateways(
            gateways
                .iter()
                .map(|g| g.clone() as Arc<dyn ContentGateway>)
                .collect(),
        )
        .with_time_sources(sources)
        .with_backend(beacon.clone())
        .build()
        .unwrap()
}

impl Harness {
    pub fn request(&self, condition: UnlockCondition) -> CreateCapsule {
        CreateCapsule {
            recipient: recipient(),
            title: "Letter to the future".to_string(),
            condition,
            content_type: "text/plain".to_string(),
            payload: PAYLOAD.to_vec(),
        }
    }

    /// Capsule unlockable `secs` after now
    pub async fn capsule_in(&self, secs: u64) -> CapsuleId {
        let condition = UnlockCondition::at_timestamp(self.clock.timestamp() + secs);
        self.service
            .create_capsule(self.request(condition))
            .await
            .unwrap()
    }

    /// Fresh service over the same records, lock backend, storage and clock;
    /// its unlock cache starts empty
    pub fn restart(&self) -> CapsuleService {
        build_service(
            &self.config,
            &self.clock,
            &self.gateways,
            &self.uploader,
            &self.beacon,
            &self.registry,
            &self.identity,
            self.sources.clone(),
        )
    }

    pub fn total_fetches(&self) -> usize {
        self.gateways.iter().map(|g| g.fetch_count()).sum()
    }
}
