/*!
 * Completion provider implementations.
 *
 * This module contains client implementations for the LLM services the
 * translator can delegate to:
 * - Gemini: Google Generative Language API
 * - Anthropic: Anthropic Messages API
 * - Ollama: Local LLM server
 * - Mock: scripted provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

/// Common trait for all completion providers
///
/// The reconciliation core only ever needs one operation: send a prompt and
/// get text back. Implementations map their transport and HTTP failures onto
/// `ProviderError` so the caller can tell transient failures from permanent ones.
#[async_trait]
pub trait CompletionService: Send + Sync + Debug {
    /// Complete a prompt
    ///
    /// # Arguments
    /// * `prompt` - The full prompt text
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - The completion text or an error
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: CompletionService + ?Sized> CompletionService for Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        (**self).complete(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the HTTP client shared by the hosted providers
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_default()
}

/// Read an error body without failing on it
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string())
}

/// Create the completion service selected in the configuration
pub fn create_service(config: &TranslationConfig) -> Result<Arc<dyn CompletionService>, ProviderError> {
    let model = config.get_model();
    let endpoint = config.get_endpoint();
    let timeout = Duration::from_secs(config.get_timeout_secs());
    let max_tokens = config.get_max_output_tokens();
    let temperature = config.common.temperature;

    let service: Arc<dyn CompletionService> = match config.provider {
        TranslationProvider::Gemini => Arc::new(gemini::Gemini::new(
            config.get_api_key(),
            endpoint,
            model,
            timeout,
            temperature,
            max_tokens,
        )),
        TranslationProvider::Anthropic => Arc::new(anthropic::Anthropic::new(
            config.get_api_key(),
            endpoint,
            model,
            timeout,
            temperature,
            max_tokens,
        )),
        TranslationProvider::Ollama => Arc::new(ollama::Ollama::new(
            &endpoint,
            model,
            timeout,
            temperature,
        )?),
    };

    Ok(service)
}

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod ollama;
