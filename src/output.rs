//! Result types returned by the backfill pipeline and `inspect`.

use crate::error::ImageFailure;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Counters accumulated over one backfill run.
///
/// Invariant: `images_updated + images_skipped + images_failed == images_found`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Slides visited (every slide of the deck).
    pub slides_processed: usize,
    /// Pictures found across all slides.
    pub images_found: usize,
    /// Pictures that received generated alt text.
    pub images_updated: usize,
    /// Pictures that already had non-blank alt text.
    pub images_skipped: usize,
    /// Pictures that needed alt text but could not be captioned.
    pub images_failed: usize,
    /// One entry per failed picture, in traversal order.
    pub failures: Vec<ImageFailure>,
    /// Where the updated presentation was written.
    pub output_path: Option<PathBuf>,
    /// Wall-clock time of the whole run.
    pub duration_ms: u64,
}

impl RunStats {
    /// Check the counting invariant.
    pub fn is_consistent(&self) -> bool {
        self.images_updated + self.images_skipped + self.images_failed == self.images_found
            && self.failures.len() == self.images_failed
    }

    /// File name of the output, for reporting to remote callers.
    pub fn output_filename(&self) -> Option<String> {
        self.output_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// One picture as seen by [`crate::backfill::inspect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureSummary {
    /// 1-indexed slide number.
    pub slide: usize,
    /// 1-indexed picture number within the slide.
    pub image: usize,
    pub shape_name: String,
    /// Trimmed alt text, `None` when missing or blank.
    pub alt_text: Option<String>,
    /// Media part backing the picture, e.g. `ppt/media/image3.png`.
    pub media_part: Option<String>,
}

/// Read-only overview of a deck's accessibility state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub total_slides: usize,
    pub total_images: usize,
    pub images_with_alt: usize,
    pub images_without_alt: usize,
    pub pictures: Vec<PictureSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DescribeError;

    #[test]
    fn default_stats_are_consistent() {
        assert!(RunStats::default().is_consistent());
    }

    #[test]
    fn inconsistent_stats_detected() {
        let stats = RunStats {
            images_found: 3,
            images_updated: 1,
            images_skipped: 1,
            ..Default::default()
        };
        assert!(!stats.is_consistent());
    }

    #[test]
    fn failures_must_match_failed_count() {
        let stats = RunStats {
            images_found: 1,
            images_failed: 1,
            failures: vec![ImageFailure {
                slide: 1,
                image: 1,
                shape_name: "Picture 1".into(),
                error: DescribeError::EmptyCaption,
            }],
            ..Default::default()
        };
        assert!(stats.is_consistent());
    }

    #[test]
    fn output_filename_strips_directory() {
        let stats = RunStats {
            output_path: Some(PathBuf::from("/tmp/out/updated_deck.pptx")),
            ..Default::default()
        };
        assert_eq!(stats.output_filename().as_deref(), Some("updated_deck.pptx"));
    }
}
