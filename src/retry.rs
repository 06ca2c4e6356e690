use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// Bounded retry for fetches that may race the player's own state settling.
///
/// The canonical use is the metadata fetch immediately after a track-change
/// notification: the player has already announced the change but not yet
/// populated artist and title. Exhaustion is not an error; the caller falls
/// back to placeholder values.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it yields a value satisfying `is_valid`.
    ///
    /// Each failed or invalid attempt is followed by `delay` before the
    /// next; the sleep suspends only this task. Returns `None` once
    /// `max_attempts` attempts have been spent, logging at debug level.
    pub async fn run<T, F, Fut, V>(&self, mut operation: F, is_valid: V) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        V: Fn(&T) -> bool,
    {
        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) if is_valid(&value) => return Some(value),
                Ok(_) => debug!(attempt, "attempt yielded an incomplete result"),
                Err(e) => debug!(attempt, error = %e, "attempt failed"),
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        debug!(
            max_attempts = self.max_attempts,
            "giving up after exhausting retries"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn never_valid_operation_runs_exactly_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = quick_policy()
            .run(
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(0u32)
                    }
                },
                |_| false,
            )
            .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_first_valid_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = quick_policy()
            .run(
                move || {
                    let counter = counter.clone();
                    async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) }
                },
                |value| *value >= 1,
            )
            .await;

        assert_eq!(result, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_count_as_failed_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Option<u32> = quick_policy()
            .run(
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(crate::ControlError::Timeout)
                    }
                },
                |_| true,
            )
            .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
