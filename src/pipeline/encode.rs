//! Image preparation: embedded bytes → bounded base64 PNG wrapped in `ImageData`.
//!
//! Slide pictures arrive in whatever format the author pasted (JPEG photos,
//! PNG screenshots, the odd GIF or TIFF). Decoding them here, rather than
//! forwarding the raw bytes, catches corrupt media before any tokens are
//! spent and gives every provider the same lossless PNG input.

use crate::error::DescribeError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// An image decoded, downscaled and encoded for the VLM API.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Base64 PNG payload, `detail: "high"`.
    pub data: ImageData,
    /// Dimensions after downscaling.
    pub width: u32,
    pub height: u32,
    /// Dimensions of the embedded original.
    pub original_width: u32,
    pub original_height: u32,
}

/// Decode embedded image bytes and encode them for the model.
///
/// The longest edge is capped at `max_dimension` (aspect ratio kept,
/// Lanczos3 resampling). Images already within bounds are not resampled.
///
/// # Errors
/// [`DescribeError::Decode`] when the bytes are not a supported raster
/// format (EMF/WMF vector clip-art, truncated files, …).
pub fn prepare_image(bytes: &[u8], max_dimension: u32) -> Result<PreparedImage, DescribeError> {
    let img = image::load_from_memory(bytes).map_err(|e| DescribeError::Decode {
        detail: e.to_string(),
    })?;

    let (original_width, original_height) = (img.width(), img.height());
    let img = if original_width.max(original_height) > max_dimension {
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img
    };

    // 16-bit and float images cannot be PNG-encoded as-is.
    let img = DynamicImage::ImageRgba8(img.to_rgba8());

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| DescribeError::Decode {
            detail: format!("PNG re-encoding failed: {e}"),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Prepared image {}x{} → {}x{}, {} bytes base64",
        original_width,
        original_height,
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(PreparedImage {
        data: ImageData::new(b64, "image/png").with_detail("high"),
        width: img.width(),
        height: img.height(),
        original_width,
        original_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn encode_small_image() {
        let prepared = prepare_image(&png_bytes(10, 10), 1024).expect("prepare should succeed");
        assert_eq!(prepared.data.mime_type, "image/png");
        assert_eq!((prepared.width, prepared.height), (10, 10));
        let decoded = STANDARD.decode(&prepared.data.data).expect("valid base64");
        assert!(!decoded.is_empty());
    }

    #[test]
    fn large_image_is_downscaled_keeping_aspect() {
        let prepared = prepare_image(&png_bytes(400, 200), 100).unwrap();
        assert_eq!((prepared.width, prepared.height), (100, 50));
        assert_eq!((prepared.original_width, prepared.original_height), (400, 200));
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let err = prepare_image(b"definitely not an image", 1024).unwrap_err();
        assert!(matches!(err, DescribeError::Decode { .. }), "got {err:?}");
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let bytes = png_bytes(32, 32);
        let err = prepare_image(&bytes[..bytes.len() / 2], 1024).unwrap_err();
        assert!(matches!(err, DescribeError::Decode { .. }));
    }
}
