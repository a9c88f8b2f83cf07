//! OCC retry wrapper: jittered exponential backoff around a handler
//! execution, hand-rolled in the same style as the teacher's
//! `RetryPolicy::delay_for_attempt` (`crates/infra/src/jobs/types.rs`)
//! rather than pulling in a retry crate.

use std::time::Duration;

/// Mirrors the teacher's `RetryPolicy` shape, scoped to the one strategy
/// this pipeline needs (exponential with jitter).
#[derive(Debug, Clone, Copy)]
pub struct OccRetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl Default for OccRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(500),
            jitter: 0.2,
        }
    }
}

impl OccRetryPolicy {
    /// Delay before retry attempt `attempt` (1-indexed). Jitter is a
    /// deterministic pseudo-random function of the attempt number, not a
    /// true random source, matching the teacher's backoff calculation.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp = 2_f64.powi((attempt - 1) as i32);
        let delay_ms = (base_ms * exp).min(max_ms);

        let jitter_range = delay_ms * self.jitter;
        let pseudo_random = ((attempt as f64 * 17.0) % 100.0) / 100.0;
        let jitter = jitter_range * (pseudo_random - 0.5) * 2.0;

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }
}

/// Retry `attempt` up to `policy.max_attempts` times whenever it returns
/// `Err(true)` ("retriable", e.g. an OCC conflict); any other outcome
/// returns immediately. Sleeps between attempts with `delay_for_attempt`.
pub async fn retry_on_occ_conflict<T, E>(
    policy: OccRetryPolicy,
    is_retriable: impl Fn(&E) -> bool,
    mut attempt_fn: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0;
    loop {
        match attempt_fn() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retriable(&err) => {
                attempt += 1;
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success_within_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, &str> = retry_on_occ_conflict(
            OccRetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                jitter: 0.0,
            },
            |_err: &&str| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("conflict")
                } else {
                    Ok("ok")
                }
            },
        )
        .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retriable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, &str> = retry_on_occ_conflict(
            OccRetryPolicy::default(),
            |_err: &&str| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("not found")
            },
        )
        .await;

        assert_eq!(result, Err("not found"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_attempts_surfaces_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, &str> = retry_on_occ_conflict(
            OccRetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                jitter: 0.0,
            },
            |_err: &&str| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("conflict")
            },
        )
        .await;

        assert_eq!(result, Err("conflict"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
