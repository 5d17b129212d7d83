//! Scriptable storage endpoints
//!
//! Both views sit on a [`MemoryNetwork`] and can be switched between behaviors
//! mid-test. Every call is counted so tests can assert that a code path made no
//! network calls.

use async_trait::async_trait;
use capsule_core::effects::{ContentGateway, ContentUploader, GatewayFailure};
use capsule_core::ContentId;
use capsule_effects::MemoryNetwork;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a [`ScriptedGateway`] answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMode {
    /// Serve from the network
    Serve,
    /// Connection failure
    Down,
    /// Answer 404
    Missing,
    /// Serve the stored bytes with the first byte flipped
    Tamper,
    /// Serve the stored bytes minus the last one
    Truncate,
    /// Sleep before answering
    Slow(Duration),
    /// Answer a 4xx status other than 404
    Reject(u16),
}

/// Gateway with switchable behavior and a call counter
#[derive(Debug)]
pub struct ScriptedGateway {
    endpoint: String,
    network: MemoryNetwork,
    mode: Mutex<GatewayMode>,
    fetches: AtomicUsize,
}

impl ScriptedGateway {
    /// Serving gateway over a network
    pub fn new(endpoint: impl Into<String>, network: MemoryNetwork) -> Self {
        Self {
            endpoint: endpoint.into(),
            network,
            mode: Mutex::new(GatewayMode::Serve),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Builder form of [`set_mode`](Self::set_mode)
    pub fn with_mode(self, mode: GatewayMode) -> Self {
        self.set_mode(mode);
        self
    }

    /// Switch behavior
    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock() = mode;
    }

    /// Fetch calls received so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn serve(&self, id: &ContentId) -> Result<Vec<u8>, GatewayFailure> {
        self.network.gateway(self.endpoint.clone()).fetch(id).await
    }
}

#[async_trait]
impl ContentGateway for ScriptedGateway {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, id: &ContentId) -> Result<Vec<u8>, GatewayFailure> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().clone();
        match mode {
            GatewayMode::Serve => self.serve(id).await,
            GatewayMode::Down => Err(GatewayFailure::unavailable("connection refused")),
            GatewayMode::Missing => Err(GatewayFailure::NotFound),
            GatewayMode::Tamper => {
                let mut bytes = self.serve(id).await?;
                if let Some(first) = bytes.first_mut() {
                    *first ^= 0xff;
                }
                Ok(bytes)
            }
            GatewayMode::Truncate => {
                let mut bytes = self.serve(id).await?;
                bytes.pop();
                Ok(bytes)
            }
            GatewayMode::Slow(delay) => {
                tokio::time::sleep(delay).await;
                self.serve(id).await
            }
            GatewayMode::Reject(status) => Err(GatewayFailure::Rejected { status }),
        }
    }
}

/// How a [`ScriptedUploader`] answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploaderMode {
    /// Store and return the correct identifier
    Accept,
    /// Connection failure
    Down,
    /// Fail this many times, then accept
    FailTimes(usize),
    /// Store and return the identifier of different bytes
    Foreign,
}

/// Uploader with switchable behavior and a call counter
#[derive(Debug)]
pub struct ScriptedUploader {
    endpoint: String,
    network: MemoryNetwork,
    mode: Mutex<UploaderMode>,
    uploads: AtomicUsize,
}

impl ScriptedUploader {
    /// Accepting uploader over a network
    pub fn new(endpoint: impl Into<String>, network: MemoryNetwork) -> Self {
        Self {
            endpoint: endpoint.into(),
            network,
            mode: Mutex::new(UploaderMode::Accept),
            uploads: AtomicUsize::new(0),
        }
    }

    /// Switch behavior
    pub fn set_mode(&self, mode: UploaderMode) {
        *self.mode.lock() = mode;
    }

    /// Upload calls received so far
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentUploader for ScriptedUploader {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn upload(&self, data: &[u8]) -> Result<ContentId, GatewayFailure> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let mode = {
            let mut mode = self.mode.lock();
            let current = mode.clone();
            if let UploaderMode::FailTimes(n) = current {
                *mode = if n <= 1 {
                    UploaderMode::Accept
                } else {
                    UploaderMode::FailTimes(n - 1)
                };
            }
            current
        };

        match mode {
            UploaderMode::Accept => self.network.uploader(self.endpoint.clone()).upload(data).await,
            UploaderMode::Down | UploaderMode::FailTimes(_) => {
                Err(GatewayFailure::unavailable("upload endpoint unreachable"))
            }
            UploaderMode::Foreign => {
                let mut other = data.to_vec();
                other.push(0);
                let id = ContentId::for_bytes(&other);
                self.network.insert_raw(id, other);
                Ok(id)
            }
        }
    }
}
