//! Bounded polling for submit-then-poll collaborators.
//!
//! A media container on the social network, for example, is created and then
//! reports `IN_PROGRESS` until it is ready. [`poll_until`] re-checks with
//! exponential backoff and gives up after `max_attempts` checks or once the
//! overall deadline passes, whichever comes first.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::config::PollSettings;
use crate::error::{ContentPipeError, Result};

/// Polling bounds.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub deadline: Duration,
    /// Jitter factor in `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&PollSettings::default())
    }
}

impl From<&PollSettings> for PollConfig {
    fn from(settings: &PollSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            deadline: Duration::from_secs(settings.deadline_secs),
            jitter: 0.25,
        }
    }
}

impl PollConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Delay before the check following `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * 2f64.powi(attempt.min(16) as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let jittered = if self.jitter > 0.0 {
            let spread = capped * self.jitter;
            let mut rng = rand::rng();
            capped + rng.random_range(-spread..=spread)
        } else {
            capped
        };

        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Result of one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// The remote job finished; carries its result.
    Ready(T),
    /// Still working; check again later.
    Pending,
    /// The remote job reported a failure.
    Failed(String),
}

/// Re-run `check` until it reports ready, failure, or the bounds run out.
///
/// Errors returned by `check` itself end polling immediately.
pub async fn poll_until<T, F, Fut>(config: &PollConfig, what: &str, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
{
    let started = Instant::now();

    for attempt in 0..config.max_attempts {
        match check().await? {
            PollStatus::Ready(value) => return Ok(value),
            PollStatus::Failed(reason) => {
                return Err(ContentPipeError::Publish(format!("{what} failed: {reason}")));
            }
            PollStatus::Pending => {}
        }

        if attempt + 1 == config.max_attempts {
            break;
        }

        let delay = config.backoff(attempt);
        let elapsed = started.elapsed();
        if elapsed + delay > config.deadline {
            return Err(ContentPipeError::Timeout(format!(
                "{what} not ready before {}s deadline",
                config.deadline.as_secs()
            )));
        }

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        debug!(what, attempt = attempt + 1, delay_ms, "still pending");
        tokio::time::sleep(delay).await;
    }

    Err(ContentPipeError::Timeout(format!(
        "{what} not ready after {} checks",
        config.max_attempts
    )))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast() -> PollConfig {
        PollConfig::default()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
            .with_deadline(Duration::from_secs(5))
            .without_jitter()
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = PollConfig::default()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1000))
            .without_jitter();
        assert_eq!(config.backoff(0), Duration::from_millis(100));
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(2), Duration::from_millis(400));
        assert_eq!(config.backoff(10), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = PollConfig::default()
            .with_initial_delay(Duration::from_millis(1000))
            .with_max_delay(Duration::from_millis(1000));
        for _ in 0..50 {
            let d = config.backoff(0).as_millis();
            assert!((750..=1250).contains(&d), "delay {d} out of range");
        }
    }

    #[tokio::test]
    async fn ready_after_pending() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = poll_until(&fast(), "container", move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok(if n < 2 { PollStatus::Pending } else { PollStatus::Ready("done") })
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = poll_until(&fast().with_max_attempts(4), "container", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(PollStatus::<()>::Pending)
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ContentPipeError::Timeout(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn remote_failure_stops_polling() {
        let err = poll_until(&fast(), "container", || async {
            Ok(PollStatus::<()>::Failed("ERROR".into()))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("container failed: ERROR"));
    }

    #[tokio::test]
    async fn deadline_bounds_total_wait() {
        let config = PollConfig::default()
            .with_initial_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(10))
            .with_deadline(Duration::from_secs(1))
            .without_jitter();
        let err = poll_until(&config, "container", || async { Ok(PollStatus::<()>::Pending) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("deadline"));
    }
}
