use std::time::Duration;

use log::warn;
use rand::Rng;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before giving up.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for both the backoff and a server's `Retry-After` hint.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits, for tests and dry runs.
    pub fn immediate(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// `backoff` plus up to a quarter of it in random jitter.
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        let spread = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
        if spread == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..=spread))
    }

    /// Delay before retry number `attempt`, honouring a server-provided hint.
    ///
    /// `None` means the server asked for more than `max_delay` and the caller
    /// should give up instead of waiting.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Option<Duration> {
        let backoff = self.jittered_backoff(attempt);
        match retry_after {
            Some(hint) if hint > self.max_delay => None,
            Some(hint) => Some(hint.max(backoff)),
            None => Some(backoff),
        }
    }

    /// Sleep before retry number `attempt`. Returns `false`, without
    /// sleeping, when the hint is over the ceiling.
    pub async fn wait(&self, attempt: u32, retry_after: Option<Duration>) -> bool {
        let Some(delay) = self.delay(attempt, retry_after) else {
            warn!(
                "Server asked to wait {:?}, more than the {:?} allowed",
                retry_after.unwrap_or_default(),
                self.max_delay
            );
            return false;
        };
        warn!("Retry {attempt} in {delay:?}");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        true
    }
}
