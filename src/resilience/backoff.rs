//! Retry scheduling for settlement reconciliation.

use rand::Rng;
use std::time::Duration;

use crate::config::ReconciliationConfig;

/// Doubling delay between reconciliation attempts on one settlement, capped,
/// with up to 10% jitter so entries that failed together spread out.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    pub fn from_config(config: &ReconciliationConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay before attempt number `attempt` (1-based). Never exceeds `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(31));
        let capped = self.base.saturating_mul(factor).min(self.max);

        let jitter_ms = capped.as_millis() as u64 / 10;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        } else {
            Duration::ZERO
        };

        (capped + jitter).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_capped() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));

        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert!(backoff.delay(1) >= Duration::from_millis(100));
        assert!(backoff.delay(2) >= Duration::from_millis(200));
        assert!(backoff.delay(3) >= Duration::from_millis(400));
        assert_eq!(backoff.delay(10), Duration::from_millis(1000));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_from_config() {
        let config = ReconciliationConfig {
            base_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..ReconciliationConfig::default()
        };
        let backoff = Backoff::from_config(&config);

        // A max below base is raised to base.
        assert_eq!(backoff.delay(4), Duration::from_millis(5_000));
    }
}
