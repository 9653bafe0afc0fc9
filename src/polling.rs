//! Fixed-interval polling with an optional deadline
//!
//! Both the startup orchestrator (waiting for the server log marker) and the
//! host façade (waiting for queue items and builds) poll a remote or on-disk
//! state until it changes. They share this policy type.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;

/// How often to poll and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between two attempts
    pub interval: Duration,

    /// Give up once this much time has passed (None = poll forever)
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Polls every `interval`, without a deadline
    #[must_use]
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    /// One-second polling without a deadline
    #[must_use]
    pub fn unbounded() -> Self {
        Self::fixed(Duration::from_secs(1))
    }

    /// Sets the deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the deadline from a number of seconds, `0` meaning none
    #[must_use]
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        if secs == 0 {
            Self {
                timeout: None,
                ..self
            }
        } else {
            self.with_timeout(Duration::from_secs(secs))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Errors returned by [`poll_until`]
#[derive(Error, Debug)]
pub enum PollError<E> {
    /// The probe itself failed
    #[error(transparent)]
    Probe(E),

    /// The deadline passed before the probe reported success
    #[error("gave up after {attempts} attempts ({waited:?})")]
    TimedOut {
        /// Time spent polling
        waited: Duration,
        /// Number of probe invocations
        attempts: u32,
    },
}

/// Runs `probe` until it yields `Some`, sleeping `policy.interval` in between.
///
/// The probe runs at least once, even with a zero timeout.
///
/// # Errors
///
/// Returns [`PollError::Probe`] as soon as the probe fails, and
/// [`PollError::TimedOut`] once the deadline has passed.
pub async fn poll_until<T, E, F, Fut>(policy: &RetryPolicy, mut probe: F) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = probe().await.map_err(PollError::Probe)? {
            return Ok(value);
        }

        let waited = started.elapsed();
        if let Some(timeout) = policy.timeout {
            if waited >= timeout {
                return Err(PollError::TimedOut { waited, attempts });
            }
            tokio::time::sleep(policy.interval.min(timeout - waited)).await;
        } else {
            tokio::time::sleep(policy.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[tokio::test]
    async fn test_poll_until_returns_first_ready_value() {
        let policy = RetryPolicy::fixed(Duration::from_millis(1));
        let mut calls = 0;

        let value = poll_until(&policy, || {
            calls += 1;
            let current = calls;
            async move { Ok::<_, Infallible>((current >= 3).then_some(current)) }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let policy =
            RetryPolicy::fixed(Duration::from_millis(5)).with_timeout(Duration::from_millis(30));

        let result = poll_until(&policy, || async { Ok::<Option<()>, Infallible>(None) }).await;

        match result {
            Err(PollError::TimedOut { waited, attempts }) => {
                assert!(waited >= Duration::from_millis(30));
                assert!(attempts >= 2);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_until_propagates_probe_error() {
        let policy = RetryPolicy::fixed(Duration::from_millis(1));

        let result = poll_until(&policy, || async { Err::<Option<()>, _>("boom") }).await;

        assert!(matches!(result, Err(PollError::Probe("boom"))));
    }

    #[test]
    fn test_zero_timeout_secs_means_forever() {
        let policy = RetryPolicy::unbounded().with_timeout_secs(0);
        assert_eq!(policy.timeout, None);

        let policy = RetryPolicy::unbounded().with_timeout_secs(5);
        assert_eq!(policy.timeout, Some(Duration::from_secs(5)));
    }
}
