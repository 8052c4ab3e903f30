use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::time::Duration;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Target language, as a name ("Japanese") or ISO code ("ja")
    pub target_language: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Batching, retry and convergence settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Where batch artifacts and the final output go
    #[serde(default)]
    pub output: OutputConfig,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Google Gemini
    #[default]
    Gemini,
    // @provider: Anthropic
    Anthropic,
    // @provider: Ollama
    Ollama,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini => "Gemini",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Gemini => "gemini".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::Ollama => "ollama".to_string(),
        }
    }

    // @returns: Whether requests need an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }

    // @returns: Environment variable holding the API key
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Ollama => None,
        }
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// What happens to the last parsed entry of every batch response
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TailGuard {
    /// Always discard the last entry in emission order
    #[default]
    DropLast,
    /// Discard the last entry only when the response holds fewer entries
    /// than the batch it answers has records
    DropLastIfShort,
    /// Keep every well-formed entry
    KeepAll,
}

/// Batching, retry and convergence settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconcileConfig {
    /// Records per batch on the initial pass
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// Gap size below which retry passes switch to `retry_batch_size`
    #[serde(default = "default_retry_batch_size_threshold")]
    pub retry_batch_size_threshold: usize,

    /// Records per batch on retry passes with a small gap
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: usize,

    /// Retries of one batch after transient failures
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts_per_batch: u32,

    /// Fixed wait before retrying a failed batch, in milliseconds
    #[serde(default = "default_retry_cooldown_ms")]
    pub retry_cooldown_ms: u64,

    /// Minimum spacing between two completion calls, in milliseconds
    #[serde(default = "default_call_pacing_delay_ms")]
    pub call_pacing_delay_ms: u64,

    /// Upper bound on retry passes before giving up
    #[serde(default = "default_max_retry_passes")]
    pub max_retry_passes: u32,

    /// Batches of one pass allowed in flight at the same time
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Last-entry policy for batch responses
    #[serde(default)]
    pub tail_guard: TailGuard,
}

impl ReconcileConfig {
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.retry_cooldown_ms)
    }

    pub fn call_pacing_delay(&self) -> Duration {
        Duration::from_millis(self.call_pacing_delay_ms)
    }

    /// Batch size for a retry pass over a gap of `gap_len` records
    pub fn retry_pass_batch_size(&self, gap_len: usize) -> usize {
        if gap_len < self.retry_batch_size_threshold {
            self.retry_batch_size
        } else {
            self.default_batch_size
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            default_batch_size: default_batch_size(),
            retry_batch_size_threshold: default_retry_batch_size_threshold(),
            retry_batch_size: default_retry_batch_size(),
            max_retry_attempts_per_batch: default_max_retry_attempts(),
            retry_cooldown_ms: default_retry_cooldown_ms(),
            call_pacing_delay_ms: default_call_pacing_delay_ms(),
            max_retry_passes: default_max_retry_passes(),
            max_concurrent_batches: default_max_concurrent_batches(),
            tail_guard: TailGuard::default(),
        }
    }
}

/// Output locations
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Directory holding one JSON file per processed batch
    #[serde(default = "default_batch_dir")]
    pub batch_dir: String,

    /// Merged output file
    #[serde(default = "default_final_output")]
    pub final_output: String,

    /// Key of the record array in the input document, if not discoverable
    #[serde(default)]
    pub records_key: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            batch_dir: default_batch_dir(),
            final_output: default_final_output(),
            records_key: None,
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Max tokens per completion
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(provider_type),
            api_key: String::new(),
            endpoint: default_endpoint(provider_type),
            timeout_secs: default_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Temperature parameter for text generation (0.0 to 1.0)
    /// Lower values make output more deterministic, higher values more creative
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_batch_size() -> usize {
    20
}

fn default_retry_batch_size_threshold() -> usize {
    20
}

fn default_retry_batch_size() -> usize {
    5
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_cooldown_ms() -> u64 {
    5000
}

fn default_call_pacing_delay_ms() -> u64 {
    3000
}

fn default_max_retry_passes() -> u32 {
    10
}

fn default_max_concurrent_batches() -> usize {
    1
}

fn default_batch_dir() -> String {
    "batch_translations".to_string()
}

fn default_final_output() -> String {
    "final_translations.json".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.3
}

fn default_model(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Gemini => "gemini-1.5-flash".to_string(),
        TranslationProvider::Anthropic => "claude-3-haiku-20240307".to_string(),
        TranslationProvider::Ollama => "llama3.2".to_string(),
    }
}

fn default_endpoint(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta".to_string(),
        TranslationProvider::Anthropic => "https://api.anthropic.com".to_string(),
        TranslationProvider::Ollama => "http://localhost:11434".to_string(),
    }
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::resolve_language_name(&self.target_language)?;

        let reconcile = &self.reconcile;
        if reconcile.default_batch_size == 0 {
            return Err(anyhow!("reconcile.default_batch_size must be at least 1"));
        }
        if reconcile.retry_batch_size == 0 {
            return Err(anyhow!("reconcile.retry_batch_size must be at least 1"));
        }
        if reconcile.max_concurrent_batches == 0 {
            return Err(anyhow!("reconcile.max_concurrent_batches must be at least 1"));
        }

        // Validate API key for hosted providers
        if self.translation.provider.requires_api_key() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                self.translation.provider.display_name()
            ));
        }

        if self.output.batch_dir.trim().is_empty() {
            return Err(anyhow!("output.batch_dir cannot be empty"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: "fr".to_string(),
            log_level: LogLevel::default(),
            reconcile: ReconcileConfig::default(),
            translation: TranslationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Mutable access to the active provider entry, created with defaults if absent
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let index = match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        // Default fallback based on provider type
        default_model(self.provider)
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }

        String::new()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        default_endpoint(self.provider)
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        match self.get_active_provider_config() {
            Some(provider_config) if provider_config.timeout_secs > 0 => provider_config.timeout_secs,
            _ => default_timeout_secs(),
        }
    }

    /// Get the completion token limit for the active provider
    pub fn get_max_output_tokens(&self) -> u32 {
        match self.get_active_provider_config() {
            Some(provider_config) if provider_config.max_output_tokens > 0 => provider_config.max_output_tokens,
            _ => default_max_output_tokens(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Gemini),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::Ollama),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
