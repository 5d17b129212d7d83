//! Configuration for the capsule pipeline
//!
//! Loaded from TOML, overridden by `CAPSULE_*` environment variables, then
//! validated. Every section has serde defaults so a partial file is enough.

use crate::errors::{CapsuleError, Result};
use crate::reliability::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "CAPSULE_";

/// Trait for configuration validation
pub trait ConfigValidation {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsuleConfig {
    /// Content store settings
    pub store: StoreConfig,
    /// Time-lock settings
    pub timelock: TimeLockConfig,
    /// Verification pipeline settings
    pub verification: VerificationConfig,
    /// Ledger clock settings
    pub ledger: LedgerConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl CapsuleConfig {
    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CapsuleError::invalid(format!("Invalid TOML: {e}")))
    }

    /// Load from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CapsuleError::invalid(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from file, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CAPSULE_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `CAPSULE_*` overrides from an explicit variable list
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "GATEWAYS" => {
                    self.store.gateways = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                }
                "UPLOAD_ENDPOINT" => self.store.upload_endpoint = Some(value),
                "GATEWAY_TIMEOUT_MS" => self.store.gateway_timeout_ms = parse_num(&key, &value)?,
                "FETCH_DEADLINE_MS" => self.store.fetch_deadline_ms = parse_num(&key, &value)?,
                "LOCK_TIMEOUT_MS" => self.timelock.call_timeout_ms = parse_num(&key, &value)?,
                "MIN_VALID_SOURCES" => {
                    self.verification.consensus = ConsensusPolicy::AtLeast(parse_num(&key, &value)?);
                }
                "TIME_SOURCES" => {
                    self.verification.external_sources = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                }
                "BLOCK_TIME_SECS" => self.ledger.block_time_secs = parse_num(&key, &value)?,
                "LOG_LEVEL" => self.logging.level = value,
                _ => tracing::debug!(variable = %key, "Ignoring unknown configuration override"),
            }
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CapsuleError::invalid(format!("{key} must be a number, got {value:?}")))
}

impl ConfigValidation for CapsuleConfig {
    fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.timelock.validate()?;
        self.verification.validate()?;
        self.ledger.validate()?;
        Ok(())
    }
}

/// Content store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Ranked gateway base URLs, tried in order
    pub gateways: Vec<String>,
    /// Upload endpoint base URL
    pub upload_endpoint: Option<String>,
    /// Timeout for a single gateway request
    pub gateway_timeout_ms: u64,
    /// Deadline for the whole gateway fallback loop
    pub fetch_deadline_ms: u64,
    /// Retry budget for uploads
    pub upload_retry: RetryPolicy,
}

impl StoreConfig {
    /// Per-gateway timeout
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    /// Overall fetch deadline
    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_millis(self.fetch_deadline_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            gateways: vec![
                "https://ipfs.io".to_string(),
                "https://dweb.link".to_string(),
                "https://cloudflare-ipfs.com".to_string(),
            ],
            upload_endpoint: None,
            gateway_timeout_ms: 10_000,
            fetch_deadline_ms: 30_000,
            upload_retry: RetryPolicy::exponential().with_timeout(Duration::from_secs(30)),
        }
    }
}

impl ConfigValidation for StoreConfig {
    fn validate(&self) -> Result<()> {
        if self.gateways.is_empty() {
            return Err(CapsuleError::invalid("store.gateways must not be empty"));
        }
        if self.gateway_timeout_ms == 0 {
            return Err(CapsuleError::invalid("store.gateway_timeout_ms must be > 0"));
        }
        if self.fetch_deadline_ms < self.gateway_timeout_ms {
            return Err(CapsuleError::invalid(
                "store.fetch_deadline_ms must be at least one gateway timeout",
            ));
        }
        Ok(())
    }
}

/// Time-lock settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeLockConfig {
    /// Timeout for each backend call
    pub call_timeout_ms: u64,
    /// Largest secret the scheme accepts
    pub max_secret_len: usize,
    /// Seconds after the condition during which the key can still be released
    pub expiry_window_secs: Option<u64>,
}

impl TimeLockConfig {
    /// Backend call timeout
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for TimeLockConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 15_000,
            max_secret_len: 32,
            expiry_window_secs: None,
        }
    }
}

impl ConfigValidation for TimeLockConfig {
    fn validate(&self) -> Result<()> {
        if self.call_timeout_ms == 0 {
            return Err(CapsuleError::invalid("timelock.call_timeout_ms must be > 0"));
        }
        if self.max_secret_len == 0 {
            return Err(CapsuleError::invalid("timelock.max_secret_len must be > 0"));
        }
        Ok(())
    }
}

/// How many time sources must agree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusPolicy {
    /// At least `n` valid sources, the authoritative ledger included
    AtLeast(usize),
    /// Strictly more than half of all queried sources
    Majority,
}

impl ConsensusPolicy {
    /// Whether `valid` out of `total` sources satisfies the policy
    pub fn is_satisfied(&self, valid: usize, total: usize) -> bool {
        match *self {
            Self::AtLeast(n) => valid >= n,
            Self::Majority => valid * 2 > total,
        }
    }
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self::AtLeast(1)
    }
}

/// How validator results reduce to one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionPolicy {
    /// Every validator must pass
    Unanimous,
    /// At least `min_passing` validators pass and no mandatory validator fails
    Quorum {
        /// Passing validators required
        min_passing: usize,
    },
}

impl Default for ReductionPolicy {
    fn default() -> Self {
        Self::Unanimous
    }
}

/// Verification pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Skew tolerated for the authoritative ledger clock
    pub authoritative_tolerance_secs: u64,
    /// Skew tolerated for external reference clocks
    pub external_tolerance_secs: u64,
    /// Timeout for each time-source query
    pub source_timeout_ms: u64,
    /// Time consensus policy
    pub consensus: ConsensusPolicy,
    /// Require at least one external source to corroborate
    pub require_external_corroboration: bool,
    /// Validator reduction policy
    pub reduction: ReductionPolicy,
    /// External time source URLs
    pub external_sources: Vec<String>,
}

impl VerificationConfig {
    /// Per-source timeout
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            authoritative_tolerance_secs: 5 * 60,
            external_tolerance_secs: 30 * 60,
            source_timeout_ms: 5_000,
            consensus: ConsensusPolicy::default(),
            require_external_corroboration: false,
            reduction: ReductionPolicy::default(),
            external_sources: Vec::new(),
        }
    }
}

impl ConfigValidation for VerificationConfig {
    fn validate(&self) -> Result<()> {
        if self.source_timeout_ms == 0 {
            return Err(CapsuleError::invalid(
                "verification.source_timeout_ms must be > 0",
            ));
        }
        if self.consensus == ConsensusPolicy::AtLeast(0) {
            return Err(CapsuleError::invalid(
                "verification.consensus must require at least one valid source",
            ));
        }
        if let ReductionPolicy::Quorum { min_passing: 0 } = self.reduction {
            return Err(CapsuleError::invalid(
                "verification.reduction quorum must be > 0",
            ));
        }
        Ok(())
    }
}

/// Ledger clock settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Average block interval used to estimate heights and remaining time
    pub block_time_secs: u64,
    /// Timestamp of block zero for estimated heights
    pub genesis_timestamp: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            block_time_secs: 12,
            genesis_timestamp: 0,
        }
    }
}

impl ConfigValidation for LedgerConfig {
    fn validate(&self) -> Result<()> {
        if self.block_time_secs == 0 {
            return Err(CapsuleError::invalid("ledger.block_time_secs must be > 0"));
        }
        Ok(())
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit ANSI colours
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = CapsuleConfig::default();
        config.validate().unwrap();
        assert_eq!(config.verification.authoritative_tolerance_secs, 300);
        assert_eq!(config.verification.external_tolerance_secs, 1800);
        assert_eq!(config.verification.consensus, ConsensusPolicy::AtLeast(1));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = CapsuleConfig::from_toml_str(
            r#"
            [store]
            gateways = ["https://gw.example"]
            gateway_timeout_ms = 500
            fetch_deadline_ms = 2000

            [verification]
            consensus = "majority"
            reduction = { quorum = { min_passing = 2 } }
            "#,
        )
        .unwrap();
        assert_eq!(config.store.gateways, vec!["https://gw.example"]);
        assert_eq!(config.verification.consensus, ConsensusPolicy::Majority);
        assert_eq!(
            config.verification.reduction,
            ReductionPolicy::Quorum { min_passing: 2 }
        );
        assert_eq!(config.timelock.max_secret_len, 32);
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CapsuleConfig::default();
        config
            .merge_with_vars(vec![
                ("CAPSULE_GATEWAYS".to_string(), "https://a, https://b".to_string()),
                ("CAPSULE_MIN_VALID_SOURCES".to_string(), "2".to_string()),
                ("CAPSULE_LOG_LEVEL".to_string(), "debug".to_string()),
                ("PATH".to_string(), "/usr/bin".to_string()),
            ])
            .unwrap();
        assert_eq!(config.store.gateways, vec!["https://a", "https://b"]);
        assert_eq!(config.verification.consensus, ConsensusPolicy::AtLeast(2));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_env_override_rejects_non_numeric() {
        let mut config = CapsuleConfig::default();
        let err = config
            .merge_with_vars(vec![(
                "CAPSULE_GATEWAY_TIMEOUT_MS".to_string(),
                "soon".to_string(),
            )])
            .unwrap_err();
        assert!(matches!(err, CapsuleError::Invalid { .. }));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = CapsuleConfig::default();
        config.store.gateways.clear();
        assert!(config.validate().is_err());

        let mut config = CapsuleConfig::default();
        config.store.fetch_deadline_ms = 10;
        assert!(config.validate().is_err());

        let mut config = CapsuleConfig::default();
        config.verification.consensus = ConsensusPolicy::AtLeast(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\nblock_time_secs = 6").unwrap();
        let config = CapsuleConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.ledger.block_time_secs, 6);
    }

    #[test]
    fn test_consensus_policy() {
        assert!(ConsensusPolicy::AtLeast(1).is_satisfied(1, 3));
        assert!(!ConsensusPolicy::Majority.is_satisfied(1, 3));
        assert!(ConsensusPolicy::Majority.is_satisfied(2, 3));
    }
}
