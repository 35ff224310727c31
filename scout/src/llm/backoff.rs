use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::config::OracleConfig;

/// Explicit retry policy: attempt budget plus an exponential, jittered,
/// capped delay schedule. Kept as data so tests can assert the schedule
/// without sleeping.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_cap_ms),
        }
    }

    /// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped, with full jitter drawing from [cap/2, cap].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let uncapped = self.base_delay.saturating_mul(1u32 << exponent);
        let capped = uncapped.min(self.max_delay);
        let jittered = rand::thread_rng().gen_range(capped.as_millis() / 2..=capped.as_millis());
        Duration::from_millis(jittered as u64)
    }
}

/// Sleep abstraction so retry behavior is testable without real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
