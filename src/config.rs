//! Configuration types for alt-text backfill runs.
//!
//! Two structs split the knobs by lifetime:
//!
//! * [`ModelConfig`] — how to reach and prompt the vision model. Consumed
//!   once, when the process builds its single [`crate::model::VisionModel`].
//! * [`BackfillConfig`] — per-run behaviour (timeouts, output naming,
//!   image extraction, progress reporting). Cheap to clone and reuse across
//!   many documents.
//!
//! Both are built via a builder so callers set only what they care about
//! and rely on documented defaults for the rest.

use crate::error::AltTextError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model when a provider is named but no model is given.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for the vision model wrapper.
///
/// # Example
/// ```rust
/// use pptx_alttext::ModelConfig;
///
/// let config = ModelConfig::builder()
///     .model("gpt-4.1-mini")
///     .max_tokens(300)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ModelConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano", "claude-sonnet-4-20250514".
    /// If None, uses [`DEFAULT_MODEL`] or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Alt text should describe what is in the picture, not invent it; a low
    /// temperature keeps the model literal.
    pub temperature: f32,

    /// Maximum tokens the model may generate per image. Default: 512.
    pub max_tokens: usize,

    /// Longest edge, in pixels, of the image sent to the model. Default: 1024.
    ///
    /// Slide pictures are often straight-from-camera photos of 4000+ px.
    /// Downscaling keeps the request well below API upload limits without
    /// losing anything a one-paragraph description needs.
    pub max_image_dimension: u32,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 512,
            max_image_dimension: 1024,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl ModelConfig {
    /// Create a new builder for `ModelConfig`.
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ModelConfig`].
#[derive(Debug)]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
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

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(64);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ModelConfig, AltTextError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(AltTextError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(ref p) = c.system_prompt {
            if p.trim().is_empty() {
                return Err(AltTextError::InvalidConfig(
                    "system prompt must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

/// Per-run configuration for [`crate::backfill::process`].
///
/// # Example
/// ```rust
/// use pptx_alttext::BackfillConfig;
///
/// let config = BackfillConfig::builder()
///     .api_timeout_secs(30)
///     .extract_images_dir("images")
///     .build()
///     .unwrap();
/// assert_eq!(config.output_prefix, "updated_");
/// ```
#[derive(Clone)]
pub struct BackfillConfig {
    /// Per-image vision call timeout in seconds. Default: 60.
    ///
    /// A hung request fails only the picture it belongs to.
    pub api_timeout_secs: u64,

    /// Prefix for the default output file name. Default: "updated_".
    ///
    /// `deck.pptx` → `updated_deck.pptx` in the same directory.
    pub output_prefix: String,

    /// When set, every picture sent to the model is also written here as
    /// `slide{N}_{shape name}.{ext}`. Default: None.
    pub extract_images_dir: Option<PathBuf>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress events sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            api_timeout_secs: 60,
            output_prefix: "updated_".to_string(),
            extract_images_dir: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BackfillConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackfillConfig")
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("output_prefix", &self.output_prefix)
            .field("extract_images_dir", &self.extract_images_dir)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BackfillProgressCallback>"),
            )
            .finish()
    }
}

impl BackfillConfig {
    /// Create a new builder for `BackfillConfig`.
    pub fn builder() -> BackfillConfigBuilder {
        BackfillConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BackfillConfig`].
#[derive(Debug)]
pub struct BackfillConfigBuilder {
    config: BackfillConfig,
}

impl BackfillConfigBuilder {
    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    pub fn extract_images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.extract_images_dir = Some(dir.into());
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
    pub fn build(self) -> Result<BackfillConfig, AltTextError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(AltTextError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.output_prefix.is_empty() {
            return Err(AltTextError::InvalidConfig(
                "output prefix must not be empty (the output would replace the input)".into(),
            ));
        }
        if c.output_prefix.contains(['/', '\\']) {
            return Err(AltTextError::InvalidConfig(format!(
                "output prefix must be a plain file-name prefix, got '{}'",
                c.output_prefix
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_defaults() {
        let c = ModelConfig::default();
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.max_tokens, 512);
        assert_eq!(c.max_image_dimension, 1024);
        assert!(c.provider.is_none());
    }

    #[test]
    fn model_builder_clamps() {
        let c = ModelConfig::builder()
            .temperature(9.0)
            .max_image_dimension(3)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_image_dimension, 64);
    }

    #[test]
    fn model_builder_rejects_zero_tokens() {
        assert!(ModelConfig::builder().max_tokens(0).build().is_err());
    }

    #[test]
    fn model_builder_rejects_blank_prompt() {
        assert!(ModelConfig::builder().system_prompt("  \n").build().is_err());
    }

    #[test]
    fn backfill_builder_rejects_empty_prefix() {
        let err = BackfillConfig::builder().output_prefix("").build().unwrap_err();
        assert!(err.to_string().contains("prefix"));
    }

    #[test]
    fn backfill_builder_rejects_path_prefix() {
        assert!(BackfillConfig::builder().output_prefix("out/").build().is_err());
    }

    #[test]
    fn backfill_builder_rejects_zero_timeout() {
        assert!(BackfillConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_hides_provider() {
        let c = ModelConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("ModelConfig"));
    }
}
