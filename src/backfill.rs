//! Backfill entry points: walk a deck, caption pictures without alt text,
//! write a new copy.
//!
//! ## Failure Model
//!
//! Anything that prevents producing an output file (input missing, not a
//! presentation, output not writable) aborts the run with an
//! [`AltTextError`]. Anything that only affects one picture (corrupt media,
//! model error, timeout, empty answer) is recorded in
//! [`RunStats::failures`] and the walk moves on; that picture keeps its
//! missing alt text in the output.
//!
//! Pictures are described one at a time, in slide order. Nothing is ever
//! written to the input file.

use crate::config::BackfillConfig;
use crate::document::{same_file, PictureRef, Presentation};
use crate::error::{AltTextError, DescribeError, ImageFailure};
use crate::model::ImageDescriber;
use crate::output::{DocumentSummary, PictureSummary, RunStats};
use crate::pipeline::input::{self, ResolvedInput};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Backfill alt text for a presentation file or URL.
///
/// # Arguments
/// * `input` — local path or HTTP/HTTPS URL of a `.pptx`
/// * `output` — where to write the new copy; `None` uses
///   [`default_output_path`] (URL inputs land in the current directory)
/// * `describer` — the process's model wrapper, built once by the caller
/// * `config` — per-run settings
///
/// # Returns
/// `Ok(RunStats)` whenever the output was written, even if every picture
/// failed (check `stats.images_failed`). A deck without pictures still
/// produces an output file.
///
/// # Errors
/// Only fatal errors: bad input, invalid package, output path equal to the
/// input, or output write failure. No output file exists after an error.
pub async fn process(
    input: impl AsRef<str>,
    output: Option<&Path>,
    describer: &dyn ImageDescriber,
    config: &BackfillConfig,
) -> Result<RunStats, AltTextError> {
    let start = Instant::now();
    let input = input.as_ref();
    info!("Starting alt-text backfill: {}", input);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input, config.download_timeout_secs).await?;
    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => output_path_for(&resolved, &config.output_prefix),
    };
    if same_file(&output_path, resolved.path()) {
        return Err(AltTextError::OutputIsInput { path: output_path });
    }

    // ── Step 2: Open document ────────────────────────────────────────────
    let mut doc = open_blocking(resolved.path().to_path_buf()).await?;

    // ── Step 3: Caption pictures ─────────────────────────────────────────
    let mut stats = backfill_document(&mut doc, describer, config).await;

    // ── Step 4: Save a new copy ──────────────────────────────────────────
    let save_path = output_path.clone();
    tokio::task::spawn_blocking(move || doc.save(&save_path))
        .await
        .map_err(|e| AltTextError::Internal(format!("save task panicked: {e}")))??;

    stats.output_path = Some(output_path);
    stats.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Backfill complete: {} updated, {} skipped, {} failed of {} pictures on {} slides, {}ms",
        stats.images_updated,
        stats.images_skipped,
        stats.images_failed,
        stats.images_found,
        stats.slides_processed,
        stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(&stats);
    }

    drop(resolved);
    Ok(stats)
}

/// Blocking wrapper around [`process`] for callers without a runtime.
///
/// Creates a fresh multi-threaded tokio runtime; do not call from async code.
pub fn process_sync(
    input: impl AsRef<str>,
    output: Option<&Path>,
    describer: &dyn ImageDescriber,
    config: &BackfillConfig,
) -> Result<RunStats, AltTextError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AltTextError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process(input, output, describer, config))
}

/// Caption every picture without alt text in an already-opened document.
///
/// Edits are applied to `doc` in memory; the caller decides where to save.
/// `output_path` and `duration_ms` of the returned stats are left unset.
pub async fn backfill_document(
    doc: &mut Presentation,
    describer: &dyn ImageDescriber,
    config: &BackfillConfig,
) -> RunStats {
    let total_slides = doc.slide_count();
    let mut stats = RunStats {
        slides_processed: total_slides,
        ..Default::default()
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_slides, doc.picture_count());
    }

    for slide in 0..total_slides {
        let slide_number = slide + 1;
        info!("Checking slide {}/{}", slide_number, total_slides);
        if let Some(ref cb) = config.progress_callback {
            cb.on_slide_start(slide_number, total_slides);
        }

        let refs: Vec<PictureRef> = doc.slide_pictures(slide).collect();
        for r in refs {
            stats.images_found += 1;
            let image_number = r.image_number();
            let picture = doc.picture(r);

            if picture.has_alt_text() {
                debug!(
                    "Slide {}, image {} ('{}') already has alt text",
                    slide_number,
                    image_number,
                    picture.name()
                );
                stats.images_skipped += 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_image_skipped(slide_number, image_number);
                }
                continue;
            }

            let shape_name = picture.name().to_string();
            match describe_picture(doc, r, describer, config).await {
                Ok(caption) => {
                    info!(
                        "Slide {}, image {} ('{}'): added alt text ({} chars)",
                        slide_number,
                        image_number,
                        shape_name,
                        caption.chars().count()
                    );
                    doc.set_alt_text(r, &caption);
                    stats.images_updated += 1;
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_image_updated(slide_number, image_number, caption.chars().count());
                    }
                }
                Err(error) => {
                    let failure = ImageFailure {
                        slide: slide_number,
                        image: image_number,
                        shape_name,
                        error,
                    };
                    warn!("Failed to describe {}", failure);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_image_failed(slide_number, image_number, &failure.error.to_string());
                    }
                    stats.images_failed += 1;
                    stats.failures.push(failure);
                }
            }
        }
    }

    debug_assert!(stats.is_consistent());
    stats
}

/// Read one picture's bytes, optionally extract them, and ask the model.
async fn describe_picture(
    doc: &Presentation,
    r: PictureRef,
    describer: &dyn ImageDescriber,
    config: &BackfillConfig,
) -> Result<String, DescribeError> {
    let bytes = doc.image_bytes(r)?;

    if let Some(ref dir) = config.extract_images_dir {
        let picture = doc.picture(r);
        let ext = picture.extension().unwrap_or_else(|| "png".to_string());
        let path = dir.join(extracted_image_name(r.slide_number(), picture.name(), r.image_number(), &ext));
        if let Err(e) = write_extracted(&path, &bytes).await {
            warn!("Could not extract image to {}: {}", path.display(), e);
        }
    }

    let secs = config.api_timeout_secs;
    match tokio::time::timeout(Duration::from_secs(secs), describer.describe(&bytes)).await {
        Ok(result) => result,
        Err(_) => Err(DescribeError::Timeout { secs }),
    }
}

async fn write_extracted(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    debug!("Extracted {}", path.display());
    Ok(())
}

/// `slide{N}_{shape name}.{ext}` with the shape name reduced to
/// file-name-safe characters. Unnamed shapes use `image{M}`.
fn extracted_image_name(slide: usize, shape_name: &str, image: usize, ext: &str) -> String {
    let safe: String = shape_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if safe.trim_matches('_').is_empty() {
        format!("slide{slide}_image{image}.{ext}")
    } else {
        format!("slide{slide}_{safe}.{ext}")
    }
}

/// Read-only accessibility overview of a presentation file or URL.
pub async fn inspect(input: impl AsRef<str>, download_timeout_secs: u64) -> Result<DocumentSummary, AltTextError> {
    let resolved = input::resolve_input(input.as_ref(), download_timeout_secs).await?;
    let doc = open_blocking(resolved.path().to_path_buf()).await?;
    Ok(summarize(&doc))
}

/// Build a [`DocumentSummary`] from an opened document.
pub fn summarize(doc: &Presentation) -> DocumentSummary {
    let pictures: Vec<PictureSummary> = doc
        .pictures()
        .map(|r| {
            let pic = doc.picture(r);
            PictureSummary {
                slide: r.slide_number(),
                image: r.image_number(),
                shape_name: pic.name().to_string(),
                alt_text: pic
                    .alt_text()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
                media_part: pic.media_part().map(str::to_string),
            }
        })
        .collect();

    let images_with_alt = pictures.iter().filter(|p| p.alt_text.is_some()).count();
    DocumentSummary {
        total_slides: doc.slide_count(),
        total_images: pictures.len(),
        images_with_alt,
        images_without_alt: pictures.len() - images_with_alt,
        pictures,
    }
}

/// `<dir>/<prefix><file name>`: `decks/q3.pptx` → `decks/updated_q3.pptx`.
pub fn default_output_path(input: &Path, prefix: &str) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "presentation.pptx".to_string());
    let file_name = format!("{prefix}{name}");
    match input.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(file_name),
        _ => PathBuf::from(file_name),
    }
}

/// Downloaded inputs live in a temp dir, so their output goes to the
/// current directory instead.
fn output_path_for(resolved: &ResolvedInput, prefix: &str) -> PathBuf {
    if resolved.is_downloaded() {
        let name = resolved
            .path()
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("downloaded.pptx"));
        default_output_path(&name, prefix)
    } else {
        default_output_path(resolved.path(), prefix)
    }
}

async fn open_blocking(path: PathBuf) -> Result<Presentation, AltTextError> {
    tokio::task::spawn_blocking(move || Presentation::open(&path))
        .await
        .map_err(|e| AltTextError::Internal(format!("open task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_keeps_directory() {
        assert_eq!(
            default_output_path(Path::new("decks/q3.pptx"), "updated_"),
            PathBuf::from("decks/updated_q3.pptx")
        );
        assert_eq!(
            default_output_path(Path::new("q3.pptx"), "updated_"),
            PathBuf::from("updated_q3.pptx")
        );
        assert_eq!(
            default_output_path(Path::new("/tmp/a b.pptx"), "alt_"),
            PathBuf::from("/tmp/alt_a b.pptx")
        );
    }

    #[test]
    fn extracted_names_are_file_safe() {
        assert_eq!(extracted_image_name(2, "Picture 3", 1, "png"), "slide2_Picture_3.png");
        assert_eq!(extracted_image_name(1, "a/b:c", 4, "jpeg"), "slide1_a_b_c.jpeg");
        assert_eq!(extracted_image_name(5, "", 2, "gif"), "slide5_image2.gif");
        assert_eq!(extracted_image_name(5, "///", 3, "gif"), "slide5_image3.gif");
    }
}
