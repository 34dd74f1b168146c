//! Configuration types for study-guide generation.
//!
//! All pipeline behaviour is controlled through [`StudyGuideConfig`], built
//! via its [`StudyGuideConfigBuilder`]. One struct for every knob makes it
//! easy to share a config across tasks and to log exactly what a run used.

use crate::error::StudyGuideError;
use crate::generator::StudyGuideGenerator;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Hard cap on generation calls per chunk.
pub const MAX_ATTEMPTS_PER_CHUNK: u32 = 3;

/// Configuration for a study-guide run.
///
/// # Example
/// ```rust
/// use edgequake_studyguide::StudyGuideConfig;
///
/// let config = StudyGuideConfig::builder()
///     .max_chunk_chars(8_000)
///     .request_interval_ms(500)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct StudyGuideConfig {
    /// Maximum characters per chunk sent to the model. Default: 12 000.
    ///
    /// Lines are never split, so a single overlong line can still produce a
    /// larger chunk. Lower this if requests hit provider size or time limits.
    pub max_chunk_chars: usize,

    /// Minimum characters of extracted text before any generation is
    /// attempted. Default: 50.
    pub min_text_chars: usize,

    /// Pause before the first request of every chunk after the first.
    /// Default: 1 000 ms.
    ///
    /// Throttles the steady-state request rate against rate-limited APIs.
    pub request_interval_ms: u64,

    /// Base delay before a retry, doubled on each further retry of the same
    /// chunk. Default: 2 000 ms (2 s → 4 s).
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// LLM model identifier. If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed generator. Takes precedence over every provider field.
    pub generator: Option<Arc<dyn StudyGuideGenerator>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the model may generate per chunk. Default: 8192.
    ///
    /// A dense chunk yields several sections with questions each; too low a
    /// cap truncates the JSON and every attempt fails to parse.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses the built-in bilingual prompt.
    pub system_prompt: Option<String>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Images whose width or height is below this are dropped during
    /// extraction (bullets, rules, logos). Default: 32 px.
    pub min_image_side: u32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Chunk-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StudyGuideConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 12_000,
            min_text_chars: 50,
            request_interval_ms: 1_000,
            retry_backoff_ms: 2_000,
            api_timeout_secs: 120,
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            temperature: 0.3,
            max_tokens: 8192,
            system_prompt: None,
            password: None,
            min_image_side: 32,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for StudyGuideConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyGuideConfig")
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("min_text_chars", &self.min_text_chars)
            .field("request_interval_ms", &self.request_interval_ms)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "generator",
                &self.generator.as_ref().map(|_| "<dyn StudyGuideGenerator>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("min_image_side", &self.min_image_side)
            .finish()
    }
}

impl StudyGuideConfig {
    /// Create a new builder for `StudyGuideConfig`.
    pub fn builder() -> StudyGuideConfigBuilder {
        StudyGuideConfigBuilder {
            config: Self::default(),
        }
    }

    /// Delay before attempt `attempt` (0-based) of chunk `chunk_index`
    /// (0-based).
    ///
    /// * first attempt of the first chunk: none
    /// * first attempt of any later chunk: `request_interval_ms`
    /// * retry `k`: `retry_backoff_ms * 2^(k-1)`
    pub fn delay_before(&self, chunk_index: usize, attempt: u32) -> Duration {
        if attempt == 0 {
            if chunk_index == 0 {
                Duration::ZERO
            } else {
                Duration::from_millis(self.request_interval_ms)
            }
        } else {
            let factor = 2u64.saturating_pow(attempt - 1);
            Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
        }
    }
}

/// Builder for [`StudyGuideConfig`].
#[derive(Debug)]
pub struct StudyGuideConfigBuilder {
    config: StudyGuideConfig,
}

impl StudyGuideConfigBuilder {
    pub fn max_chunk_chars(mut self, n: usize) -> Self {
        self.config.max_chunk_chars = n;
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn request_interval_ms(mut self, ms: u64) -> Self {
        self.config.request_interval_ms = ms;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn StudyGuideGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn min_image_side(mut self, px: u32) -> Self {
        self.config.min_image_side = px;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudyGuideConfig, StudyGuideError> {
        let c = &self.config;
        if c.max_chunk_chars == 0 {
            return Err(StudyGuideError::InvalidConfig(
                "max_chunk_chars must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(StudyGuideError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(StudyGuideError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
