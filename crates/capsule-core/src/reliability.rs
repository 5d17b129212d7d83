//! Retry policy for transient external failures
//!
//! Storage uploads and other idempotent external calls retry within a bounded
//! budget. Retries never outlive the process: once the budget is spent the last
//! error is surfaced and the caller decides whether to re-invoke.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff strategy for retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Linear increase: delay * attempt
    Linear,
    /// Exponential increase: delay * 2^attempt
    Exponential,
    /// Exponential with jitter to prevent thundering herd
    ExponentialWithJitter,
}

impl BackoffStrategy {
    /// Calculate delay for a zero-based retry attempt
    pub fn calculate_delay(
        &self,
        attempt: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Duration {
        use rand::Rng;

        let delay = match self {
            BackoffStrategy::Fixed => initial_delay,
            BackoffStrategy::Linear => initial_delay.saturating_mul(attempt + 1),
            BackoffStrategy::Exponential => {
                initial_delay.saturating_mul(2u32.saturating_pow(attempt))
            }
            BackoffStrategy::ExponentialWithJitter => {
                let base_delay = initial_delay.saturating_mul(2u32.saturating_pow(attempt));
                let jitter =
                    (base_delay.as_millis() as f64 * 0.1 * rand::thread_rng().gen::<f64>()) as u64;
                base_delay + Duration::from_millis(jitter)
            }
        };

        delay.min(max_delay)
    }
}

/// Outcome of a single attempt when a per-attempt timeout is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError<E> {
    /// The operation returned an error
    Failed(E),
    /// The operation exceeded the per-attempt timeout
    TimedOut(Duration),
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (0 = no retries)
    pub max_attempts: u32,
    /// Initial delay before first retry
    #[serde(with = "duration_ms")]
    pub initial_delay: Duration,
    /// Maximum delay between retries
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,
    /// Backoff strategy to use
    pub strategy: BackoffStrategy,
    /// Timeout for individual attempts
    #[serde(default, with = "option_duration_ms")]
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Exponential backoff, three retries
    pub fn exponential() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            strategy: BackoffStrategy::Exponential,
            timeout: None,
        }
    }

    /// Fixed delay, three retries
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_attempts: 3,
            initial_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            timeout: None,
        }
    }

    /// Set maximum retry attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set timeout for individual attempts
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Calculate delay for a specific retry
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.strategy
            .calculate_delay(attempt, self.initial_delay, self.max_delay)
    }

    /// Execute with retry, applying the per-attempt timeout and collecting every failure
    pub async fn execute_with_context<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = tokio::time::Instant::now();
        let mut attempt = 0;
        let mut failures = Vec::new();

        loop {
            let outcome = match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, operation(attempt)).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(AttemptError::Failed(err)),
                    Err(_) => Err(AttemptError::TimedOut(limit)),
                },
                None => operation(attempt).await.map_err(AttemptError::Failed),
            };

            match outcome {
                Ok(value) => {
                    return RetryResult {
                        result: Ok(value),
                        attempts: attempt + 1,
                        total_duration: start.elapsed(),
                        failures,
                    };
                }
                Err(err) => {
                    failures.push(err);
                    if attempt >= self.max_attempts {
                        return RetryResult {
                            result: Err(()),
                            attempts: attempt + 1,
                            total_duration: start.elapsed(),
                            failures,
                        };
                    }
                    tokio::time::sleep(self.calculate_delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

/// Result of a retry operation with every attempt's failure
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// Final value, or `Err(())` when the budget ran out; causes are in `failures`
    pub result: Result<T, ()>,
    /// Number of attempts made
    pub attempts: u32,
    /// Total duration including retries
    pub total_duration: Duration,
    /// One entry per failed attempt, in order
    pub failures: Vec<AttemptError<E>>,
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

pub(crate) mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
