//! Capsule service facade and builder
//!
//! Wires the ledger clock, identity, transaction, storage, time-source and
//! time-lock collaborators into one service exposing create, unlock and status.

use crate::audit::{AuditEntry, AuditLog};
use crate::orchestrator::{CapsuleStatus, DecryptedContent, OrchestratorParts, UnlockOrchestrator};
use capsule_core::effects::{
    ContentGateway, ContentUploader, IdentityEffects, LedgerClockEffects, TimeSourceEffects,
    TransactionEffects,
};
use capsule_core::{
    seal_payload, CapsuleConfig, CapsuleError, CapsuleId, ConfigValidation, DecryptionMaterial,
    Identity, Result, UnlockCondition,
};
use capsule_effects::{
    HttpGateway, HttpTimeSource, HttpUploader, JournalTransactionHandler, SystemLedgerClock,
};
use capsule_lifecycle::{CapsuleRegistry, KeyEnvelope, NewCapsule};
use capsule_store::ContentStore;
use capsule_timelock::{BeaconTimeLock, TimeLockBackend, TimeLockCipher};
use capsule_verify::VerificationPipeline;
use std::sync::Arc;
use tracing::{info, warn};

const USER_AGENT: &str = concat!("capsule-agent/", env!("CARGO_PKG_VERSION"));

/// Request to create a capsule as the current identity
#[derive(Clone, PartialEq, Eq)]
pub struct CreateCapsule {
    /// Identity allowed to unlock
    pub recipient: Identity,
    /// Display title
    pub title: String,
    /// When the content becomes unlockable
    pub condition: UnlockCondition,
    /// MIME-style content type tag
    pub content_type: String,
    /// Plaintext to protect
    pub payload: Vec<u8>,
}

impl std::fmt::Debug for CreateCapsule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateCapsule")
            .field("recipient", &self.recipient)
            .field("title", &self.title)
            .field("condition", &self.condition)
            .field("content_type", &self.content_type)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Capsule service: create, unlock and inspect capsules
pub struct CapsuleService {
    identity: Arc<dyn IdentityEffects>,
    registry: Arc<CapsuleRegistry>,
    cipher: Arc<TimeLockCipher>,
    store: Arc<ContentStore>,
    audit: Arc<AuditLog>,
    orchestrator: UnlockOrchestrator,
}

impl CapsuleService {
    /// Start building a service
    pub fn builder() -> CapsuleServiceBuilder {
        CapsuleServiceBuilder::new()
    }

    /// Encrypt, time-lock and store a payload, then record the capsule as `Locked`
    ///
    /// The payload key is locked before anything is uploaded; a lock backend
    /// failure aborts creation with nothing stored.
    pub async fn create_capsule(&self, request: CreateCapsule) -> Result<CapsuleId> {
        if request.payload.is_empty() {
            return Err(CapsuleError::invalid("capsule payload is empty"));
        }
        let creator = self.identity.current_identity().await;

        let material = DecryptionMaterial::generate();
        let sealed = seal_payload(&material, &request.payload)?;
        let (ciphertext, handle) = {
            let key = material.key_bytes();
            self.cipher.lock(&key[..], request.condition).await?
        };
        let payload_nonce = material.nonce();
        drop(material);

        let content_id = self.store.put(&sealed).await?;

        let id = self
            .registry
            .create(NewCapsule {
                creator: creator.clone(),
                recipient: request.recipient,
                title: request.title,
                condition: request.condition,
                size: request.payload.len() as u64,
                content_type: request.content_type,
            })
            .await?;
        self.registry
            .seal(
                id,
                content_id,
                KeyEnvelope {
                    ciphertext,
                    handle,
                    payload_nonce,
                },
            )
            .await?;

        info!(capsule = %id, creator = %creator, content_id = %content_id, "Capsule created");
        Ok(id)
    }

    /// Attempt an unlock on behalf of `requester`
    pub async fn attempt_unlock(
        &self,
        id: CapsuleId,
        requester: Identity,
    ) -> Result<DecryptedContent> {
        self.orchestrator.attempt_unlock(id, requester).await
    }

    /// Attempt an unlock as the current identity
    pub async fn attempt_unlock_as_current(&self, id: CapsuleId) -> Result<DecryptedContent> {
        let requester = self.identity.current_identity().await;
        self.orchestrator.attempt_unlock(id, requester).await
    }

    /// State and remaining wait of a capsule
    pub async fn capsule_status(&self, id: CapsuleId) -> Result<CapsuleStatus> {
        self.orchestrator.status(id).await
    }

    /// Audit trail of unlock attempts for a capsule
    pub fn audit(&self, id: CapsuleId) -> Vec<AuditEntry> {
        self.audit.entries(id)
    }

    /// Capsule records
    pub fn registry(&self) -> &CapsuleRegistry {
        &self.registry
    }

    /// Content store
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Number of capsules moved to `Unlocked` by this service
    pub fn unlock_transitions(&self) -> usize {
        self.orchestrator.unlock_transitions()
    }
}

impl std::fmt::Debug for CapsuleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapsuleService")
            .field("capsules", &self.registry.len())
            .field("store", &self.store)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CapsuleService`]
///
/// Collaborators not supplied explicitly are built from the configuration:
/// system ledger clock, in-memory transaction journal, beacon time lock, HTTP
/// gateways, HTTP uploader and HTTP time sources.
#[derive(Default)]
pub struct CapsuleServiceBuilder {
    config: CapsuleConfig,
    ledger: Option<Arc<dyn LedgerClockEffects>>,
    identity: Option<Arc<dyn IdentityEffects>>,
    transactions: Option<Arc<dyn TransactionEffects>>,
    uploader: Option<Arc<dyn ContentUploader>>,
    gateways: Option<Vec<Arc<dyn ContentGateway>>>,
    time_sources: Option<Vec<Arc<dyn TimeSourceEffects>>>,
    backend: Option<Arc<dyn TimeLockBackend>>,
    registry: Option<Arc<CapsuleRegistry>>,
    http_client: Option<reqwest::Client>,
}

impl CapsuleServiceBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn with_config(mut self, config: CapsuleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the ledger clock
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerClockEffects>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Set the identity provider
    pub fn with_identity(mut self, identity: Arc<dyn IdentityEffects>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the transaction collaborator
    pub fn with_transactions(mut self, transactions: Arc<dyn TransactionEffects>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    /// Set the upload endpoint
    pub fn with_uploader(mut self, uploader: Arc<dyn ContentUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Set the ranked gateway list
    pub fn with_gateways(mut self, gateways: Vec<Arc<dyn ContentGateway>>) -> Self {
        self.gateways = Some(gateways);
        self
    }

    /// Set the external time sources
    pub fn with_time_sources(mut self, sources: Vec<Arc<dyn TimeSourceEffects>>) -> Self {
        self.time_sources = Some(sources);
        self
    }

    /// Set the time-lock backend
    pub fn with_backend(mut self, backend: Arc<dyn TimeLockBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use an existing capsule registry; its transaction collaborator wins over
    /// [`with_transactions`](Self::with_transactions)
    pub fn with_registry(mut self, registry: Arc<CapsuleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// HTTP client shared by every gateway, the uploader and the time sources
    /// built from configuration
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the service
    pub fn build(self) -> Result<CapsuleService> {
        let config = self.config;
        config.validate()?;

        let identity = self
            .identity
            .ok_or_else(|| CapsuleError::invalid("identity provider required"))?;
        let ledger: Arc<dyn LedgerClockEffects> = match self.ledger {
            Some(ledger) => ledger,
            None => Arc::new(SystemLedgerClock::new(&config.ledger)),
        };
        let registry = match (self.registry, self.transactions) {
            (Some(registry), _) => registry,
            (None, Some(transactions)) => Arc::new(CapsuleRegistry::new(transactions)),
            (None, None) => {
                warn!("No transaction collaborator supplied, using in-memory journal");
                let journal = Arc::new(JournalTransactionHandler::new());
                Arc::new(CapsuleRegistry::new(journal))
            }
        };
        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| CapsuleError::internal(format!("HTTP client: {e}")))?,
        };
        let backend: Arc<dyn TimeLockBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(
                BeaconTimeLock::new(ledger.clone(), config.ledger.block_time_secs)
                    .with_expiry(config.timelock.expiry_window_secs),
            ),
        };
        let uploader = self.uploader.or_else(|| {
            config
                .store
                .upload_endpoint
                .as_ref()
                .map(|url| {
                    Arc::new(HttpUploader::with_client(url.clone(), http.clone()))
                        as Arc<dyn ContentUploader>
                })
        });
        let gateways = match self.gateways {
            Some(gateways) => gateways,
            None => config
                .store
                .gateways
                .iter()
                .map(|url| {
                    Arc::new(HttpGateway::with_client(url.clone(), http.clone()))
                        as Arc<dyn ContentGateway>
                })
                .collect(),
        };
        let time_sources = match self.time_sources {
            Some(sources) => sources,
            None => config
                .verification
                .external_sources
                .iter()
                .map(|url| {
                    Arc::new(HttpTimeSource::with_client(url.clone(), http.clone()))
                        as Arc<dyn TimeSourceEffects>
                })
                .collect(),
        };

        let cipher = Arc::new(TimeLockCipher::new(backend, config.timelock.clone()));
        let store = Arc::new(ContentStore::new(config.store.clone(), uploader, gateways));
        let pipeline = Arc::new(VerificationPipeline::standard(
            &config.verification,
            ledger.clone(),
            time_sources,
            cipher.clone(),
        ));
        let audit = Arc::new(AuditLog::new());

        info!(
            backend = %cipher.backend_name(),
            gateways = store.gateway_endpoints().len(),
            validators = ?pipeline.validator_names(),
            "Capsule service ready"
        );

        let orchestrator = UnlockOrchestrator::new(OrchestratorParts {
            registry: registry.clone(),
            cipher: cipher.clone(),
            store: store.clone(),
            pipeline,
            ledger,
            block_time_secs: config.ledger.block_time_secs,
            audit: audit.clone(),
        });

        Ok(CapsuleService {
            identity,
            registry,
            cipher,
            store,
            audit,
            orchestrator,
        })
    }
}
