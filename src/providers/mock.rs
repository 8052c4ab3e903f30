/*!
 * Mock completion service for testing.
 *
 * `MockCompletion` answers prompts with a scripted responder closure and
 * records every prompt it receives:
 * - `MockCompletion::working()` - translates every record of the prompt
 * - `MockCompletion::failing(err)` - always fails with the given error
 * - `MockCompletion::failing_first(n, err)` - fails `n` times, then works
 * - `MockCompletion::new(|prompt| ...)` - anything else
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::CompletionService;

/// Scripted answer to one prompt
pub type Responder = dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync;

/// Mock completion service with a scripted responder
#[derive(Clone)]
pub struct MockCompletion {
    /// Produces the answer for each prompt
    responder: Arc<Responder>,
    /// Every prompt received, in call order
    prompts: Arc<Mutex<Vec<String>>>,
    /// Request counter
    request_count: Arc<AtomicUsize>,
    /// Simulated latency
    delay: Option<Duration>,
}

impl fmt::Debug for MockCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockCompletion")
            .field("request_count", &self.request_count())
            .field("delay", &self.delay)
            .finish()
    }
}

impl MockCompletion {
    /// Create a mock answering every prompt with `responder`
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            prompts: Arc::new(Mutex::new(Vec::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Create a mock that translates every record it is asked for
    pub fn working() -> Self {
        Self::new(|prompt| Ok(Self::well_formed_response(&Self::prompt_ids(prompt))))
    }

    /// Create a mock that always fails
    pub fn failing(error: ProviderError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    /// Create a mock that fails `failures` times before translating normally
    pub fn failing_first(failures: usize, error: ProviderError) -> Self {
        let seen = AtomicUsize::new(0);
        Self::new(move |prompt| {
            if seen.fetch_add(1, Ordering::SeqCst) < failures {
                Err(error.clone())
            } else {
                Ok(Self::well_formed_response(&Self::prompt_ids(prompt)))
            }
        })
    }

    /// Sleep for `delay` (tokio time) before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completion calls made so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of all prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Record ids listed in each received prompt, in call order
    pub fn requested_ids(&self) -> Vec<Vec<u64>> {
        self.prompts.lock().iter().map(|p| Self::prompt_ids(p)).collect()
    }

    /// Extract the record ids listed in a prompt (`ID: n` lines)
    pub fn prompt_ids(prompt: &str) -> Vec<u64> {
        prompt
            .lines()
            .filter_map(|line| line.trim_start().strip_prefix("ID: "))
            .filter_map(|rest| rest.trim().parse().ok())
            .collect()
    }

    /// Generate a response translating every id, in the given order
    pub fn well_formed_response(ids: &[u64]) -> String {
        ids.iter()
            .map(|id| format!("{}: translated {}", id, id))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The translation text `well_formed_response` produces for an id
    pub fn translation_for(id: u64) -> String {
        format!("translated {}", id)
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(prompt)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
