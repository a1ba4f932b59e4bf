//! # pptx-alttext
//!
//! Backfill missing alternative text on pictures in PowerPoint (`.pptx`)
//! decks using Vision Language Models (VLMs).
//!
//! Screen readers announce a picture by its alt text; pictures without it
//! are skipped or read out as a file name. This crate walks every slide,
//! asks a VLM to describe each picture that has no description yet, writes
//! the answer into the picture's `descr` attribute, and saves a new copy of
//! the deck. Pictures that already have alt text are never touched, and the
//! input file is never modified.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .pptx
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Document  read the zip package, list pictures in slide order
//!  ├─ 3. Encode    embedded media → downscaled PNG → base64 ImageData
//!  ├─ 4. VLM       one call per picture without alt text
//!  ├─ 5. Polish    strip labels, fences and Markdown from the answer
//!  └─ 6. Output    rewrite `descr`, save a new package, return run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pptx_alttext::{process, BackfillConfig, ModelConfig, VisionModel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let model = VisionModel::from_config(&ModelConfig::default())?;
//!     let stats = process("deck.pptx", None, &model, &BackfillConfig::default()).await?;
//!     println!(
//!         "{} updated, {} skipped, {} failed → {:?}",
//!         stats.images_updated, stats.images_skipped, stats.images_failed, stats.output_path
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `alttext` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables [`server`], the axum HTTP wrapper |
//!
//! Disable both when using only the library:
//! ```toml
//! pptx-alttext = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backfill;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backfill::{backfill_document, default_output_path, inspect, process, process_sync, summarize};
pub use config::{BackfillConfig, BackfillConfigBuilder, ModelConfig, ModelConfigBuilder, DEFAULT_MODEL};
pub use document::{MediaSource, Picture, PictureRef, Presentation, Slide};
pub use error::{AltTextError, DescribeError, ImageFailure};
pub use model::{ImageDescriber, VisionModel};
pub use output::{DocumentSummary, PictureSummary, RunStats};
pub use pipeline::encode::PreparedImage;
pub use progress::{BackfillProgressCallback, NoopProgressCallback, ProgressCallback};
