//! Configuration types for diet-composition analysis.
//!
//! Two pieces of configuration exist and both are built once at startup,
//! then passed explicitly to the [`crate::analyze::Analyzer`]:
//!
//! * [`AnalysisConfig`] — every tunable knob (rendering, model, retries,
//!   timeouts), built via [`AnalysisConfigBuilder`].
//! * [`Credentials`] — which environment variable holds the provider's API
//!   key. A missing key is reported immediately as
//!   [`AnalysisError::Configuration`] instead of surfacing on the first VLM
//!   call.

use crate::error::AnalysisError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Upper bound accepted by [`AnalysisConfigBuilder::max_retries`].
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Configuration for one analysis run.
///
/// # Example
/// ```rust
/// use nutrivisual::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .dpi(150)
///     .model("gemini-2.0-flash")
///     .api_timeout_secs(45)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_timeout_secs, 45);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Rendering DPI for PDF pages. Range: 72–400. Default: 150.
    ///
    /// Page images keep the page's own aspect ratio: a page of
    /// `w × h` points renders to `w·dpi/72 × h·dpi/72` pixels.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Applied after the DPI scaling; the other edge shrinks proportionally.
    pub max_rendered_pixels: u32,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic"). Default: "gemini".
    pub provider_name: String,

    /// LLM model identifier. Default: "gemini-2.0-flash".
    pub model: String,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 1024.
    ///
    /// A category list plus a short commentary fits comfortably.
    pub max_tokens: usize,

    /// Retries after the first failed VLM attempt. Default: 2, at most 10.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-attempt VLM timeout in seconds. Default: 60.
    ///
    /// A timed-out attempt counts as a failure; once retries run out the
    /// request ends with [`AnalysisError::GenerationFailure`].
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Replaces the condition prompt entirely when set.
    pub prompt_override: Option<String>,

    /// Receives stage transitions while a request runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            temperature: 0.2,
            max_tokens: 1024,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            prompt_override: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("prompt_override", &self.prompt_override.is_some())
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
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

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES_LIMIT);
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

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn prompt_override(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt_override = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(AnalysisError::Configuration(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(AnalysisError::Configuration(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(AnalysisError::Configuration(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.provider.is_none() && c.provider_name.trim().is_empty() {
            return Err(AnalysisError::Configuration(
                "provider name must not be empty".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(AnalysisError::Configuration("model must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Proof that the configured provider's API key is present, checked once at
/// startup. The key itself stays in the environment, where the provider
/// factory reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    provider: String,
    key_var: Option<&'static str>,
}

/// Environment variables that may hold the API key for each known provider,
/// in lookup order. Empty for local providers that need no key.
pub fn api_key_vars(provider: &str) -> Result<&'static [&'static str], AnalysisError> {
    let vars: &'static [&'static str] = match provider.trim().to_lowercase().as_str() {
        "gemini" => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "anthropic" => &["ANTHROPIC_API_KEY"],
        "mistral" => &["MISTRAL_API_KEY"],
        "azure" => &["AZURE_OPENAI_API_KEY"],
        "openrouter" => &["OPENROUTER_API_KEY"],
        "ollama" | "lmstudio" => &[],
        other => {
            return Err(AnalysisError::Configuration(format!(
                "unknown provider '{other}'. Supported: gemini, openai, anthropic, \
mistral, azure, openrouter, ollama, lmstudio"
            )))
        }
    };
    Ok(vars)
}

/// A vision-capable model to use with `provider` when none is configured.
pub fn default_model(provider: &str) -> &'static str {
    match provider.trim().to_lowercase().as_str() {
        "openai" | "azure" => "gpt-4.1-nano",
        "anthropic" => "claude-sonnet-4-20250514",
        "mistral" => "pixtral-12b-latest",
        "openrouter" => "openai/gpt-4.1-nano",
        "ollama" | "lmstudio" => "llava",
        _ => DEFAULT_MODEL,
    }
}

impl Credentials {
    /// Check the process environment for the provider's API key.
    pub fn from_env(provider: &str) -> Result<Self, AnalysisError> {
        Self::from_lookup(provider, |name| std::env::var(name).ok())
    }

    /// Resolve credentials through an arbitrary variable lookup.
    ///
    /// The first variable in [`api_key_vars`] order holding a non-blank
    /// value wins.
    pub fn from_lookup<F>(provider: &str, lookup: F) -> Result<Self, AnalysisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = api_key_vars(provider)?;
        let key_var = match vars {
            [] => None,
            [primary, fallbacks @ ..] => {
                let found = vars
                    .iter()
                    .copied()
                    .find(|var| lookup(var).is_some_and(|v| !v.trim().is_empty()));
                if found.is_none() {
                    let also = if fallbacks.is_empty() {
                        String::new()
                    } else {
                        format!(" (or {})", fallbacks.join(", "))
                    };
                    return Err(AnalysisError::Configuration(format!(
                        "{primary}{also} is not set. Export it (or add it to .env) to use the \
'{provider}' provider."
                    )));
                }
                found
            }
        };

        Ok(Self {
            provider: provider.trim().to_lowercase(),
            key_var,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The variable the key was found in; `None` for local providers.
    pub fn key_var(&self) -> Option<&'static str> {
        self.key_var
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.provider_name, "gemini");
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.max_retries, 2);
        assert!(c.provider.is_none());
    }

    #[test]
    fn builder_clamps_values() {
        let c = AnalysisConfig::builder()
            .dpi(1000)
            .temperature(5.0)
            .max_rendered_pixels(10)
            .max_retries(500)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 400);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_rendered_pixels, 100);
        assert_eq!(c.max_retries, MAX_RETRIES_LIMIT);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = AnalysisConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration(_)));
    }

    #[test]
    fn builder_rejects_blank_model() {
        assert!(AnalysisConfig::builder().model("  ").build().is_err());
    }

    #[test]
    fn debug_hides_prompt_and_provider() {
        let c = AnalysisConfig::builder()
            .prompt_override("secret prompt")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret prompt"));
    }

    #[test]
    fn default_model_follows_provider() {
        assert_eq!(default_model("gemini"), DEFAULT_MODEL);
        assert_eq!(default_model("OpenAI"), "gpt-4.1-nano");
        assert_eq!(default_model("ollama"), "llava");
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let err = Credentials::from_lookup("gemini", |_| None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("GEMINI_API_KEY"), "got: {msg}");
        assert!(msg.contains("GOOGLE_API_KEY"), "got: {msg}");
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(Credentials::from_lookup("openai", |_| Some("   ".into())).is_err());
    }

    #[test]
    fn key_is_found_under_primary_variable() {
        let creds = Credentials::from_lookup("Gemini", |name| {
            (name == "GEMINI_API_KEY").then(|| "abc123".to_string())
        })
        .unwrap();
        assert_eq!(creds.provider(), "gemini");
        assert_eq!(creds.key_var(), Some("GEMINI_API_KEY"));
        assert!(!format!("{creds:?}").contains("abc123"));
    }

    #[test]
    fn gemini_accepts_google_api_key() {
        let creds = Credentials::from_lookup("gemini", |name| {
            (name == "GOOGLE_API_KEY").then(|| "g-key".to_string())
        })
        .unwrap();
        assert_eq!(creds.key_var(), Some("GOOGLE_API_KEY"));
    }

    #[test]
    fn primary_variable_wins_over_fallback() {
        let creds = Credentials::from_lookup("gemini", |_| Some("k".to_string())).unwrap();
        assert_eq!(creds.key_var(), Some("GEMINI_API_KEY"));

        let creds = Credentials::from_lookup("gemini", |name| match name {
            "GEMINI_API_KEY" => Some("  ".to_string()),
            _ => Some("k".to_string()),
        })
        .unwrap();
        assert_eq!(creds.key_var(), Some("GOOGLE_API_KEY"));
    }

    #[test]
    fn local_providers_need_no_key() {
        let creds = Credentials::from_lookup("ollama", |_| None).unwrap();
        assert_eq!(creds.key_var(), None);
        assert!(api_key_vars("lmstudio").unwrap().is_empty());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(matches!(
            Credentials::from_lookup("acme", |_| None),
            Err(AnalysisError::Configuration(_))
        ));
    }
}
