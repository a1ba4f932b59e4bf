//! The model wrapper: one vision-language model, one operation.
//!
//! [`ImageDescriber`] is the narrow seam the pipeline depends on:
//! `describe(image bytes) → text`. [`VisionModel`] implements it over an
//! `edgequake-llm` provider; tests and embedders can implement it over
//! anything else.
//!
//! ## Load once, reuse many
//!
//! Building a provider resolves credentials and (for local backends such as
//! Ollama) may trigger a model pull, so a process builds exactly one
//! [`VisionModel`] at its composition point (`main`, server startup) and
//! passes it by reference to every run. There is no hidden global: two
//! models in one process are possible, they just have to be asked for.

use crate::config::{ModelConfig, DEFAULT_MODEL};
use crate::error::{AltTextError, DescribeError};
use crate::pipeline::encode::{prepare_image, PreparedImage};
use crate::pipeline::postprocess::clean_caption;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, USER_INSTRUCTION};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Anything that can turn an embedded slide picture into alt text.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe an image that has already been decoded and encoded.
    async fn describe_prepared(&self, image: &PreparedImage) -> Result<String, DescribeError>;

    /// Longest edge, in pixels, passed to [`prepare_image`]. Default: 1024.
    fn max_image_dimension(&self) -> u32 {
        1024
    }

    /// Describe raw embedded image bytes (PNG, JPEG, GIF, BMP, TIFF).
    ///
    /// Decoding happens before the model is involved, so corrupt media
    /// fails fast with [`DescribeError::Decode`].
    async fn describe(&self, image_bytes: &[u8]) -> Result<String, DescribeError> {
        let prepared = prepare_image(image_bytes, self.max_image_dimension())?;
        self.describe_prepared(&prepared).await
    }
}

/// [`ImageDescriber`] backed by an `edgequake-llm` vision provider.
pub struct VisionModel {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
    max_image_dimension: u32,
}

impl std::fmt::Debug for VisionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionModel")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_image_dimension", &self.max_image_dimension)
            .finish()
    }
}

impl VisionModel {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ModelConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_image_dimension: config.max_image_dimension,
        }
    }

    /// Resolve the provider described by `config` and wrap it.
    ///
    /// # Errors
    /// [`AltTextError::ProviderNotConfigured`] when no provider can be built
    /// (unknown name, missing API key, nothing detectable in the environment).
    pub fn from_config(config: &ModelConfig) -> Result<Self, AltTextError> {
        let start = Instant::now();
        let provider = resolve_provider(config)?;
        info!("Vision model ready in {}ms", start.elapsed().as_millis());
        Ok(Self::new(provider, config))
    }

    /// The underlying provider handle.
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ImageDescriber for VisionModel {
    async fn describe_prepared(&self, image: &PreparedImage) -> Result<String, DescribeError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(USER_INSTRUCTION, vec![image.data.clone()]),
        ];
        let options = self.build_options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| DescribeError::Llm {
                detail: e.to_string(),
            })?;

        debug!(
            "{}x{} image: {} input tokens, {} output tokens, {:?}",
            image.width,
            image.height,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        let caption = clean_caption(&response.content);
        if caption.is_empty() {
            return Err(DescribeError::EmptyCaption);
        }
        Ok(caption)
    }

    fn max_image_dimension(&self) -> u32 {
        self.max_image_dimension
    }
}

/// The provider/model pair the caller asked for, if any.
///
/// `--provider` beats the `EDGEQUAKE_LLM_PROVIDER`/`EDGEQUAKE_MODEL` pair,
/// which beats a bare `OPENAI_API_KEY`. `--model` overrides the model of
/// whichever source wins.
fn requested_provider(config: &ModelConfig) -> Option<(String, String)> {
    let model_or = |fallback: &str| config.model.clone().unwrap_or_else(|| fallback.to_string());
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

    if let Some(name) = &config.provider_name {
        return Some((name.clone(), model_or(DEFAULT_MODEL)));
    }
    if let (Some(provider), Some(model)) = (env("EDGEQUAKE_LLM_PROVIDER"), env("EDGEQUAKE_MODEL")) {
        return Some((provider, model_or(&model)));
    }
    env("OPENAI_API_KEY").map(|_| ("openai".to_string(), model_or(DEFAULT_MODEL)))
}

/// Build the captioning provider. A pre-built provider is used as-is; with
/// nothing requested, `ProviderFactory::from_env` gets the last word.
fn resolve_provider(config: &ModelConfig) -> Result<Arc<dyn LLMProvider>, AltTextError> {
    if let Some(provider) = &config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some((name, model)) = requested_provider(config) {
        debug!(provider = %name, model = %model, "Using requested captioning provider");
        return ProviderFactory::create_llm_provider(&name, &model).map_err(|e| {
            AltTextError::ProviderNotConfigured {
                hint: format!("'{name}' could not be started with model '{model}': {e}"),
                provider: name,
            }
        });
    }

    ProviderFactory::from_env()
        .map(|(llm, _embedding)| llm)
        .map_err(|e| AltTextError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "no captioning model found in the environment ({e}).\n\
                 Export OPENAI_API_KEY or another provider key, or run with --provider and --model."
            ),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    /// Describes images by their post-downscale size.
    struct SizeDescriber {
        max: u32,
    }

    #[async_trait]
    impl ImageDescriber for SizeDescriber {
        async fn describe_prepared(&self, image: &PreparedImage) -> Result<String, DescribeError> {
            Ok(format!("{}x{}", image.width, image.height))
        }

        fn max_image_dimension(&self) -> u32 {
            self.max
        }
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn explicit_provider_wins_and_keeps_model_override() {
        let config = ModelConfig::builder()
            .provider_name("ollama")
            .model("llava")
            .build()
            .unwrap();
        assert_eq!(
            requested_provider(&config),
            Some(("ollama".to_string(), "llava".to_string()))
        );

        let config = ModelConfig::builder().provider_name("openai").build().unwrap();
        assert_eq!(
            requested_provider(&config),
            Some(("openai".to_string(), DEFAULT_MODEL.to_string()))
        );
    }

    #[tokio::test]
    async fn describe_decodes_and_downscales_first() {
        let d = SizeDescriber { max: 50 };
        assert_eq!(d.describe(&png(200, 100)).await.unwrap(), "50x25");
    }

    #[tokio::test]
    async fn describe_reports_decode_errors() {
        let d = SizeDescriber { max: 1024 };
        let err = d.describe(b"\x89PNG garbage").await.unwrap_err();
        assert!(matches!(err, DescribeError::Decode { .. }));
    }

    #[test]
    fn explicit_provider_name_with_unknown_backend_fails() {
        let config = ModelConfig::builder()
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        let err = VisionModel::from_config(&config).unwrap_err();
        assert!(
            matches!(err, AltTextError::ProviderNotConfigured { ref provider, .. } if provider == "definitely-not-a-provider"),
            "got {err:?}"
        );
    }
}
