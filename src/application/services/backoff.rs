use crate::shared::config::SyncConfig;
use rand::Rng;

/// Exponential backoff with a cap and proportional jitter. Drives when a
/// failed outbox entry becomes eligible again; retries are scheduled, never
/// slept inline.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base_ms: i64,
    cap_ms: i64,
    jitter_ratio: f64,
}

impl BackoffPolicy {
    pub fn new(base_ms: i64, cap_ms: i64, jitter_ratio: f64) -> Self {
        Self {
            base_ms: base_ms.max(1),
            cap_ms: cap_ms.max(1),
            jitter_ratio: jitter_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.backoff_base_ms,
            config.backoff_cap_ms,
            config.backoff_jitter_ratio,
        )
    }

    /// Delay before the attempt following `retry_count` prior failures:
    /// `min(base * 2^retry_count, cap)`, jittered by up to `jitter_ratio`.
    pub fn delay_ms(&self, retry_count: u32) -> i64 {
        let exponent = retry_count.min(20);
        let raw = self
            .base_ms
            .saturating_mul(1i64 << exponent)
            .min(self.cap_ms);
        let span = (raw as f64 * self.jitter_ratio) as i64;
        if span == 0 {
            return raw;
        }
        let jitter = rand::thread_rng().gen_range(-span..=span);
        (raw + jitter).max(1)
    }

    pub fn next_retry_at(&self, now_ms: i64, retry_count: u32) -> i64 {
        now_ms.saturating_add(self.delay_ms(retry_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_cap() {
        let policy = BackoffPolicy::new(1_000, 8_000, 0.0);
        assert_eq!(policy.delay_ms(0), 1_000);
        assert_eq!(policy.delay_ms(1), 2_000);
        assert_eq!(policy.delay_ms(2), 4_000);
        assert_eq!(policy.delay_ms(3), 8_000);
        assert_eq!(policy.delay_ms(10), 8_000);
    }

    #[test]
    fn jitter_stays_proportional() {
        let policy = BackoffPolicy::new(1_000, 60_000, 0.2);
        for retry in 0..5 {
            let base = 1_000i64 << retry;
            let delay = policy.delay_ms(retry);
            assert!(delay >= base - base / 5);
            assert!(delay <= base + base / 5);
        }
    }

    #[test]
    fn large_retry_counts_do_not_overflow() {
        let policy = BackoffPolicy::new(1_000, 30_000, 0.0);
        assert_eq!(policy.delay_ms(u32::MAX), 30_000);
    }
}
