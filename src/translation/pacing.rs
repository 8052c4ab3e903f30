/*!
 * Call pacing and retry policy for completion requests.
 *
 * `Pacer` enforces a minimum pause between one completion call finishing and
 * the next one starting, across every worker sharing it. `RetryPolicy` retries transient failures
 * after a fixed cooldown.
 */

use log::warn;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::app_config::ReconcileConfig;
use crate::errors::ProviderError;

/// Global spacing between completion calls.
///
/// The delay runs from the end of the previous call, or from its start
/// while it is still in flight, to the start of the next one.
#[derive(Debug, Clone)]
pub struct Pacer {
    /// Minimum pause between two calls
    delay: Duration,
    /// Latest call start or completion seen
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait until a call may be made, then claim the slot.
    ///
    /// The lock is held while sleeping, so concurrent callers are released one
    /// `delay` apart in arrival order.
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let ready_at = previous + self.delay;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    /// Record that a call has just finished
    pub async fn finish(&self) {
        let now = Instant::now();
        let mut last_call = self.last_call.lock().await;
        if last_call.is_none_or(|previous| previous < now) {
            *last_call = Some(now);
        }
    }

    /// Run `call` in its paced slot
    pub async fn paced<F: Future>(&self, call: F) -> F::Output {
        self.wait().await;
        let output = call.await;
        self.finish().await;
        output
    }
}

/// Retries for transient completion failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed wait before each retry
    pub cooldown: Duration,
}

/// Result of running an operation under a `RetryPolicy`
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ProviderError>,
    /// Calls made, including the first one
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, cooldown: Duration) -> Self {
        Self { max_retries, cooldown }
    }

    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self::new(config.max_retry_attempts_per_batch, config.retry_cooldown())
    }

    /// Run `operation` until it succeeds, fails permanently or retries run out.
    ///
    /// The closure receives the zero-based attempt number.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt + 1,
                    };
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} failed ({}), retrying in {:?} (retry {}/{})",
                        label, e, self.cooldown, attempt, self.max_retries
                    );
                    tokio::time::sleep(self.cooldown).await;
                }
                Err(e) => {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt + 1,
                    };
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ReconcileConfig::default())
    }
}
