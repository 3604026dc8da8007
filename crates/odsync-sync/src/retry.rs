//! Retry policy for remote calls
//!
//! Every call the engine makes against the cloud provider goes through
//! [`with_retry`]. Transient failures (network errors, throttling, 5xx) are
//! retried with capped exponential backoff; a server-supplied retry-after
//! hint takes precedence over the computed delay. Anything else is returned
//! to the caller on the first occurrence.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use odsync_core::config::RetryConfig;
use odsync_core::ports::CloudError;

// ============================================================================
// Backoff
// ============================================================================

/// Capped exponential backoff with optional proportional jitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    /// Fraction of the delay that may be randomly shaved off (0.0..=1.0)
    jitter: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            base,
            max,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// A backoff that never waits
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0.0)
    }

    /// Delay before retry number `attempt` (0 for the first retry)
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut rng = rand::thread_rng();
        self.delay_with_rng(attempt, &mut rng)
    }

    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base_ms = self.base.as_millis().min(u128::from(u64::MAX)) as u64;
        let max_ms = self.max.as_millis().min(u128::from(u64::MAX)) as u64;
        let shift = attempt.min(16);
        let exp = base_ms.saturating_mul(1u64 << shift).min(max_ms);

        let spread = (exp as f64 * self.jitter) as u64;
        let delay_ms = if spread > 0 {
            exp - rng.gen_range(0..=spread)
        } else {
            exp
        };
        Duration::from_millis(delay_ms)
    }
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// How often and how patiently a remote call is retried
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Backoff::new(
                Duration::from_millis(config.base_delay_ms),
                Duration::from_millis(config.max_delay_ms),
                config.jitter,
            ),
        )
    }

    /// Retries without sleeping; used where delays would only slow tests down
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Backoff::none())
    }

    /// Delay before retry number `attempt`, honoring a retry-after hint
    pub fn delay_for(&self, attempt: u32, error: &CloudError) -> Duration {
        error
            .retry_after()
            .unwrap_or_else(|| self.backoff.delay(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Executes a remote call, retrying transient failures
///
/// Non-transient errors are returned immediately. After `max_attempts`
/// transient failures the last error is returned.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut f: F,
) -> Result<T, CloudError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CloudError>>,
{
    let mut attempt: u32 = 1;

    loop {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt - 1, &err);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
