//! Bounded retry around any notifier.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tracing::{error, warn};

use super::Notifier;

/// Exponential backoff with a hard attempt cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total delivery attempts, including the first
    pub max_attempts: u32,

    pub initial_interval: Duration,
    pub max_interval: Duration,

    /// Give up once this much time has passed, even below `max_attempts`
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build();
        backoff.reset();
        backoff
    }
}

/// Wraps a notifier so delivery failures are retried a bounded number of
/// times and then only logged locally. Never fails the caller.
pub struct RetryingNotifier<N> {
    inner: N,
    policy: RetryPolicy,
}

impl<N: Notifier> RetryingNotifier<N> {
    pub fn new(inner: N, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }

    /// Deliver a message. Returns whether it got through.
    pub async fn send(&self, message: &str) -> bool {
        self.deliver(message, None).await
    }

    /// Deliver a message with an image. Returns whether it got through.
    pub async fn send_with_image(&self, message: &str, image: &Path) -> bool {
        self.deliver(message, Some(image)).await
    }

    async fn deliver(&self, message: &str, image: Option<&Path>) -> bool {
        let attempts = AtomicU32::new(0);
        let attempts_ref = &attempts;
        let inner = &self.inner;
        let max_attempts = self.policy.max_attempts.max(1);

        let result = backoff::future::retry(self.policy.backoff(), move || async move {
            let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
            let sent = match image {
                Some(path) => inner.notify_with_image(message, path).await,
                None => inner.notify(message).await,
            };

            sent.map_err(|e| {
                if attempt >= max_attempts {
                    backoff::Error::permanent(e)
                } else {
                    warn!(attempt = attempt, error = %e, "Notification failed, retrying");
                    backoff::Error::transient(e)
                }
            })
        })
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(
                    attempts = attempts.load(Ordering::SeqCst),
                    error = %format!("{:#}", e),
                    message = %message,
                    "Notification undelivered"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyNotifier {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyNotifier {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, _message: &str) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(anyhow!("endpoint unreachable"))
            } else {
                Ok(())
            }
        }

        async fn notify_with_image(&self, message: &str, _image: &Path) -> Result<()> {
            self.notify(message).await
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let notifier = RetryingNotifier::new(FlakyNotifier::new(u32::MAX), fast_policy(3));

        assert!(!notifier.send("hello").await);
        assert_eq!(notifier.inner().calls(), 3);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let notifier = RetryingNotifier::new(FlakyNotifier::new(1), fast_policy(5));

        assert!(notifier.send("hello").await);
        assert_eq!(notifier.inner().calls(), 2);
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let notifier = RetryingNotifier::new(FlakyNotifier::new(1), fast_policy(1));

        assert!(!notifier.send_with_image("hello", Path::new("chart.png")).await);
        assert_eq!(notifier.inner().calls(), 1);
    }
}
