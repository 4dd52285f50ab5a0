//! VLM interaction: build vision messages and call the provider.
//!
//! The orchestrator talks to a [`TextGenerator`], never to a provider
//! directly. [`LlmTextGenerator`] is the production implementation on top of
//! `edgequake-llm`; tests substitute a fake so the full pipeline runs without
//! network access.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors and slow responses are transient. Each attempt is
//! bounded by `api_timeout_secs`; failed attempts back off exponentially
//! (`retry_backoff_ms * 2^(attempt-1)`), so with the defaults the waits are
//! 500 ms then 1 s. Once `max_retries` retries are spent the request fails
//! with [`AnalysisError::GenerationFailure`].

use crate::config::{AnalysisConfig, Credentials};
use crate::error::AnalysisError;
use crate::pipeline::encode::encode_page;
use crate::pipeline::load::PageImage;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// User-turn text sent alongside a page image.
const IMAGE_INSTRUCTION: &str = "Analyze the diet plan shown in this image.";

/// What one successful generation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    /// The model's answer, untouched.
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// 1-based number of the attempt that succeeded.
    pub attempts: u32,
}

/// Describes one page in free text, following `prompt`.
///
/// An empty `text` in the returned [`Generation`] is a valid answer; only
/// transport-level failures are errors.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, page: &PageImage, prompt: &str) -> Result<Generation, AnalysisError>;
}

/// [`TextGenerator`] backed by an `edgequake-llm` provider.
pub struct LlmTextGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_rendered_pixels: u32,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl LlmTextGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_rendered_pixels: config.max_rendered_pixels,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
            progress: config.progress_callback.clone(),
        }
    }

    /// Build the generator the configuration asks for.
    ///
    /// A pre-constructed `config.provider` wins. Otherwise the provider is
    /// created by name, and `credentials` must have been resolved for that
    /// same provider so a missing key has already been reported.
    pub fn from_config(
        config: &AnalysisConfig,
        credentials: &Credentials,
    ) -> Result<Self, AnalysisError> {
        if let Some(ref provider) = config.provider {
            return Ok(Self::new(Arc::clone(provider), config));
        }

        let name = config.provider_name.trim().to_lowercase();
        if credentials.provider() != name {
            return Err(AnalysisError::Configuration(format!(
                "credentials were resolved for '{}' but the configured provider is '{}'",
                credentials.provider(),
                name
            )));
        }

        info!("Using provider={} model={}", name, config.model);
        let provider = ProviderFactory::create_llm_provider(&name, &config.model).map_err(|e| {
            AnalysisError::Configuration(format!("could not create provider '{name}': {e}"))
        })?;
        Ok(Self::new(provider, config))
    }

    fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(&self, page: &PageImage, prompt: &str) -> Result<Generation, AnalysisError> {
        let messages = build_messages(page, prompt, self.max_rendered_pixels)?;
        let max_attempts = self.max_attempts();
        let mut last_err = String::from("unknown error");

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt - 1);
                warn!(
                    "Generation retry {}/{} after {}ms",
                    attempt - 1,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }
            if let Some(cb) = &self.progress {
                cb.on_generation_attempt(attempt, max_attempts);
            }

            match timeout(self.api_timeout, self.provider.chat(&messages, Some(&self.options))).await
            {
                Ok(Ok(response)) => {
                    debug!(
                        "Generation: {} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(Generation {
                        text: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                        attempts: attempt,
                    });
                }
                Ok(Err(e)) => {
                    last_err = e.to_string();
                    warn!("Generation attempt {} failed: {}", attempt, last_err);
                }
                Err(_) => {
                    last_err = format!("no response within {}s", self.api_timeout.as_secs());
                    warn!("Generation attempt {} timed out", attempt);
                }
            }
        }

        Err(AnalysisError::GenerationFailure {
            attempts: max_attempts,
            cause: last_err,
        })
    }
}

/// System prompt first, then one user turn carrying the page.
///
/// Visual pages go as an image attachment. Non-visual pages (word-processor
/// files with no picture) have their text inlined instead.
fn build_messages(
    page: &PageImage,
    prompt: &str,
    max_pixels: u32,
) -> Result<Vec<ChatMessage>, AnalysisError> {
    let mut messages = vec![ChatMessage::system(prompt)];

    match encode_page(page, max_pixels)? {
        Some(image) => messages.push(ChatMessage::user_with_images(IMAGE_INSTRUCTION, vec![image])),
        None => {
            let text = page.text().unwrap_or_default();
            let body = format!(
                "The document has no image. Analyze the diet plan from its text:\n\n{text}"
            );
            messages.push(ChatMessage::user(body));
        }
    }
    Ok(messages)
}

/// Wait before retry number `retry` (1-based): `base_ms * 2^(retry-1)`,
/// saturating instead of overflowing.
fn backoff_ms(base_ms: u64, retry: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(retry.saturating_sub(1)))
}

fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
