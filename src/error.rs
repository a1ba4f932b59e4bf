//! Error types for the pptx-alttext library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AltTextError`] — **Fatal**: the run cannot produce any useful output
//!   (bad input file, not a PowerPoint package, no vision model configured,
//!   output not writable). Returned as `Err(AltTextError)` from
//!   [`crate::backfill::process`] and friends.
//!
//! * [`DescribeError`] — **Non-fatal**: a single picture could not be
//!   captioned (corrupt image bytes, model call failed, empty answer) but
//!   every other picture is fine. Recorded as an [`ImageFailure`] inside
//!   [`crate::output::RunStats`] so one bad image never wastes the rest of the
//!   batch.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pptx-alttext library.
#[derive(Debug, Error)]
pub enum AltTextError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Presentation not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The file exists and was read, but is not a zip container at all.
    #[error("File is not a PowerPoint (.pptx) package: '{path}'\nFirst bytes: {magic:?}")]
    NotAPptx { path: PathBuf, magic: [u8; 4] },

    /// The zip container is readable but lacks the PresentationML parts.
    #[error("'{path}' is not a valid presentation package: {detail}")]
    InvalidPackage { path: PathBuf, detail: String },

    /// A required part exists but could not be parsed.
    #[error("Presentation '{path}' is corrupt: {detail}")]
    CorruptPackage { path: PathBuf, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured vision provider could not be initialised (missing API key etc.).
    #[error("Vision model provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output presentation.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requested output path resolves to the input file.
    #[error("Refusing to overwrite the input presentation '{path}'\nChoose a different --output path.")]
    OutputIsInput { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AltTextError {
    /// True for errors caused by the input document itself (missing,
    /// unreadable, or not a presentation package).
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            AltTextError::FileNotFound { .. }
                | AltTextError::PermissionDenied { .. }
                | AltTextError::InvalidInput { .. }
                | AltTextError::DownloadFailed { .. }
                | AltTextError::DownloadTimeout { .. }
                | AltTextError::NotAPptx { .. }
                | AltTextError::InvalidPackage { .. }
                | AltTextError::CorruptPackage { .. }
        )
    }
}

/// Why a single picture could not be captioned.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescribeError {
    /// The embedded bytes are not a supported raster image.
    #[error("image could not be decoded: {detail}")]
    Decode { detail: String },

    /// The picture references no embedded image (linked file or dangling relationship).
    #[error("no embedded image data: {detail}")]
    MissingMedia { detail: String },

    /// The vision model call failed.
    #[error("vision model call failed: {detail}")]
    Llm { detail: String },

    /// The vision model answered with nothing usable.
    #[error("vision model returned an empty description")]
    EmptyCaption,

    /// The vision model did not answer within the configured timeout.
    #[error("vision model call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// A per-picture failure with the context needed to find it in the deck.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("slide {slide}, image {image} ('{shape_name}'): {error}")]
pub struct ImageFailure {
    /// 1-indexed slide number.
    pub slide: usize,
    /// 1-indexed picture number within the slide.
    pub image: usize,
    /// The shape's `name` attribute as shown in PowerPoint's selection pane.
    pub shape_name: String,
    pub error: DescribeError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_failure_display_has_location() {
        let f = ImageFailure {
            slide: 3,
            image: 2,
            shape_name: "Picture 7".into(),
            error: DescribeError::Decode {
                detail: "bad magic".into(),
            },
        };
        let msg = f.to_string();
        assert!(msg.contains("slide 3"), "got: {msg}");
        assert!(msg.contains("image 2"), "got: {msg}");
        assert!(msg.contains("Picture 7"), "got: {msg}");
        assert!(msg.contains("bad magic"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = DescribeError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn document_errors_are_classified() {
        let e = AltTextError::FileNotFound {
            path: PathBuf::from("/nope.pptx"),
        };
        assert!(e.is_document_error());

        let e = AltTextError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "set OPENAI_API_KEY".into(),
        };
        assert!(!e.is_document_error());
        assert!(e.to_string().contains("openai"));
    }

    #[test]
    fn describe_error_serialises_with_kind_tag() {
        let json = serde_json::to_string(&DescribeError::EmptyCaption).unwrap();
        assert_eq!(json, r#"{"kind":"empty_caption"}"#);
    }
}
