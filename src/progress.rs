//! Progress-callback trait for per-picture backfill events.
//!
//! Inject an [`Arc<dyn BackfillProgressCallback>`] via
//! [`crate::config::BackfillConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the deck.
//!
//! # Example
//!
//! ```rust
//! use pptx_alttext::{BackfillConfig, BackfillProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     updated: AtomicUsize,
//! }
//!
//! impl BackfillProgressCallback for CountingCallback {
//!     fn on_image_updated(&self, slide: usize, image: usize, caption_len: usize) {
//!         self.updated.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("slide {slide} image {image}: {caption_len} chars");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { updated: AtomicUsize::new(0) });
//!
//! let config = BackfillConfig::builder()
//!     .progress_callback(cb as Arc<dyn BackfillProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::RunStats;
use std::sync::Arc;

/// Called by the backfill pipeline as it processes each slide and picture.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Runs are sequential, but one callback may be shared
/// by several concurrent runs (the HTTP server), hence `Send + Sync`.
pub trait BackfillProgressCallback: Send + Sync {
    /// Called once after the document is opened, before any picture is visited.
    fn on_run_start(&self, total_slides: usize, total_images: usize) {
        let _ = (total_slides, total_images);
    }

    /// Called when the pipeline enters a slide (1-indexed).
    fn on_slide_start(&self, slide: usize, total_slides: usize) {
        let _ = (slide, total_slides);
    }

    /// Called when a picture already carries alt text.
    fn on_image_skipped(&self, slide: usize, image: usize) {
        let _ = (slide, image);
    }

    /// Called when a generated caption has been written back.
    fn on_image_updated(&self, slide: usize, image: usize, caption_len: usize) {
        let _ = (slide, image, caption_len);
    }

    /// Called when a picture could not be captioned.
    fn on_image_failed(&self, slide: usize, image: usize, error: &str) {
        let _ = (slide, image, error);
    }

    /// Called once after the output file has been written.
    fn on_run_complete(&self, stats: &RunStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BackfillProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BackfillConfig`].
pub type ProgressCallback = Arc<dyn BackfillProgressCallback>;
