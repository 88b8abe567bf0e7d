//! Exponential backoff with jitter for config center polling and heartbeats.

use std::time::Duration;

use rand::Rng;

/// Retry delay policy: `base * 2^(attempt-1)`, capped at `max`, plus up to 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let factor = 2u64.saturating_pow(attempt - 1);
        let capped = base_ms.saturating_mul(factor).min(max_ms);

        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        assert_eq!(backoff.delay(0), Duration::ZERO);

        let first = backoff.delay(1).as_millis();
        assert!((100..110).contains(&first));

        let second = backoff.delay(2).as_millis();
        assert!((200..220).contains(&second));

        let capped = backoff.delay(20).as_millis();
        assert!((1000..1100).contains(&capped));
    }
}
