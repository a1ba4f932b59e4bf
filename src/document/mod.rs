//! Document adapter: open a `.pptx`, enumerate picture shapes, read their
//! embedded bytes, set alt text, write a new package.
//!
//! ## Package Model
//!
//! The source file is read into memory once. [`Presentation::open`] parses
//! only the presentation part, the slide parts and their relationships;
//! everything else (masters, layouts, themes, media, custom XML) is copied
//! raw, compressed bytes and all, when the package is saved. Slides whose
//! pictures received new alt text are the only parts re-serialised.
//!
//! ## Picture Identity
//!
//! A [`PictureRef`] is a `(slide, ordinal)` pair. Ordinals count `<p:pic>`
//! elements in document order within one slide, so they stay stable while
//! alt text is edited.

mod package;
mod slide;

use crate::error::{AltTextError, DescribeError};
use package::{
    open_archive, parse_relationships, parse_slide_id_list, read_part, rels_part_for,
    resolve_target, Relationship,
};
use slide::{rewrite_alt_text, scan_pictures, ScannedPicture};
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Stable handle to one picture shape in a [`Presentation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PictureRef {
    slide: usize,
    picture: usize,
}

impl PictureRef {
    /// 1-based slide number.
    pub fn slide_number(&self) -> usize {
        self.slide + 1
    }

    /// 1-based picture number within its slide.
    pub fn image_number(&self) -> usize {
        self.picture + 1
    }
}

/// Where a picture's image data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Part inside the package, e.g. `ppt/media/image3.png`.
    Embedded(String),
    /// Linked file or URL outside the package.
    External(String),
    /// No usable image relationship (missing `r:embed`, dangling id, absent part).
    Missing(String),
}

/// One picture shape.
#[derive(Debug, Clone)]
pub struct Picture {
    shape_id: Option<String>,
    name: String,
    alt_text: Option<String>,
    media: MediaSource,
}

impl Picture {
    /// Shape name as shown in PowerPoint's selection pane.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape_id(&self) -> Option<&str> {
        self.shape_id.as_deref()
    }

    /// Current accessibility description, if any.
    pub fn alt_text(&self) -> Option<&str> {
        self.alt_text.as_deref()
    }

    /// Alt text counts as present only when it has non-whitespace content.
    pub fn has_alt_text(&self) -> bool {
        self.alt_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    pub fn media(&self) -> &MediaSource {
        &self.media
    }

    /// Package part holding the image bytes, when embedded.
    pub fn media_part(&self) -> Option<&str> {
        match &self.media {
            MediaSource::Embedded(part) => Some(part),
            _ => None,
        }
    }

    /// Lower-cased file extension of the embedded media part.
    pub fn extension(&self) -> Option<String> {
        self.media_part()
            .and_then(|p| Path::new(p).extension())
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// One slide, in presentation order.
#[derive(Debug, Clone)]
pub struct Slide {
    part_name: String,
    xml: Vec<u8>,
    pictures: Vec<Picture>,
    /// Picture ordinal → alt text to write on save.
    edits: BTreeMap<usize, String>,
}

impl Slide {
    /// Package part name, e.g. `ppt/slides/slide4.xml`.
    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn pictures(&self) -> &[Picture] {
        &self.pictures
    }
}

/// An opened presentation package.
#[derive(Debug)]
pub struct Presentation {
    source: PathBuf,
    raw: Vec<u8>,
    slides: Vec<Slide>,
}

impl Presentation {
    /// Open and scan a `.pptx` file.
    ///
    /// # Errors
    /// - [`AltTextError::FileNotFound`] / [`AltTextError::PermissionDenied`]
    /// - [`AltTextError::NotAPptx`] when the file is not a zip container
    /// - [`AltTextError::InvalidPackage`] when it is a zip but not a presentation
    /// - [`AltTextError::CorruptPackage`] when a required part cannot be parsed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AltTextError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AltTextError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => AltTextError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => AltTextError::CorruptPackage {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;
        Self::from_bytes(path, bytes)
    }

    /// Scan a package already held in memory. `source` is used in errors
    /// and to guard against overwriting the original on save.
    pub fn from_bytes(source: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, AltTextError> {
        let source = source.into();

        if bytes.len() < 4 || &bytes[..4] != b"PK\x03\x04" {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            return Err(AltTextError::NotAPptx {
                path: source,
                magic,
            });
        }

        let corrupt = |detail: String| AltTextError::CorruptPackage {
            path: source.clone(),
            detail,
        };

        let slides = {
            let mut archive = open_archive(&bytes).map_err(corrupt)?;

            let presentation_xml = read_part(&mut archive, PRESENTATION_PART)
                .map_err(corrupt)?
                .ok_or_else(|| AltTextError::InvalidPackage {
                    path: source.clone(),
                    detail: format!("missing {PRESENTATION_PART}"),
                })?;
            let slide_ids = parse_slide_id_list(&presentation_xml).map_err(corrupt)?;

            let presentation_rels = match read_part(&mut archive, &rels_part_for(PRESENTATION_PART))
                .map_err(corrupt)?
            {
                Some(xml) => parse_relationships(&xml).map_err(corrupt)?,
                None if slide_ids.is_empty() => HashMap::new(),
                None => {
                    return Err(corrupt(
                        "presentation has slides but no relationships part".to_string(),
                    ))
                }
            };

            let mut slides = Vec::with_capacity(slide_ids.len());
            for rid in &slide_ids {
                let rel = presentation_rels
                    .get(rid)
                    .ok_or_else(|| corrupt(format!("slide relationship '{rid}' not found")))?;
                if !rel.is_slide() {
                    return Err(corrupt(format!(
                        "'{rid}' in the slide list points at a '{}' part, not a slide",
                        rel.rel_type
                    )));
                }
                let part_name = resolve_target(PRESENTATION_PART, &rel.target);
                slides.push(load_slide(&mut archive, part_name).map_err(corrupt)?);
            }
            slides
        };

        let presentation = Self {
            source,
            raw: bytes,
            slides,
        };
        info!(
            "Opened {}: {} slides, {} pictures",
            presentation.source.display(),
            presentation.slide_count(),
            presentation.picture_count()
        );
        Ok(presentation)
    }

    /// Path the package was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn picture_count(&self) -> usize {
        self.slides.iter().map(|s| s.pictures.len()).sum()
    }

    /// All pictures, slide order then document order within each slide.
    pub fn pictures(&self) -> impl Iterator<Item = PictureRef> + '_ {
        self.slides
            .iter()
            .enumerate()
            .flat_map(|(slide, s)| (0..s.pictures.len()).map(move |picture| PictureRef { slide, picture }))
    }

    /// Pictures on one slide (0-based index).
    pub fn slide_pictures(&self, slide: usize) -> impl Iterator<Item = PictureRef> + '_ {
        let count = self.slides.get(slide).map_or(0, |s| s.pictures.len());
        (0..count).map(move |picture| PictureRef { slide, picture })
    }

    /// Picture metadata.
    ///
    /// `r` must come from this presentation.
    pub fn picture(&self, r: PictureRef) -> &Picture {
        &self.slides[r.slide].pictures[r.picture]
    }

    pub fn alt_text(&self, r: PictureRef) -> Option<&str> {
        self.picture(r).alt_text()
    }

    /// Raw embedded image bytes.
    ///
    /// # Errors
    /// [`DescribeError::MissingMedia`] for linked pictures, dangling
    /// relationships and unreadable media parts.
    pub fn image_bytes(&self, r: PictureRef) -> Result<Vec<u8>, DescribeError> {
        let part = match &self.picture(r).media {
            MediaSource::Embedded(part) => part,
            MediaSource::External(target) => {
                return Err(DescribeError::MissingMedia {
                    detail: format!("picture is linked to external file '{target}'"),
                })
            }
            MediaSource::Missing(detail) => {
                return Err(DescribeError::MissingMedia {
                    detail: detail.clone(),
                })
            }
        };

        let missing = |detail: String| DescribeError::MissingMedia { detail };
        let mut archive = open_archive(&self.raw).map_err(missing)?;
        read_part(&mut archive, part)
            .map_err(missing)?
            .ok_or_else(|| DescribeError::MissingMedia {
                detail: format!("media part '{part}' not found"),
            })
    }

    /// Set a picture's alt text. Takes effect in memory immediately and in
    /// the package on [`save`](Self::save).
    pub fn set_alt_text(&mut self, r: PictureRef, text: &str) {
        let slide = &mut self.slides[r.slide];
        slide.pictures[r.picture].alt_text = Some(text.to_string());
        slide.edits.insert(r.picture, text.to_string());
    }

    /// Whether any alt text has been set since opening.
    pub fn is_modified(&self) -> bool {
        self.slides.iter().any(|s| !s.edits.is_empty())
    }

    /// Serialise the package. Unmodified entries are copied raw.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AltTextError> {
        let failed = |detail: String| AltTextError::CorruptPackage {
            path: self.source.clone(),
            detail,
        };

        let mut replacements: HashMap<&str, Vec<u8>> = HashMap::new();
        for slide in self.slides.iter().filter(|s| !s.edits.is_empty()) {
            let xml = rewrite_alt_text(&slide.xml, &slide.edits).map_err(failed)?;
            debug!("Rewrote {} ({} pictures)", slide.part_name, slide.edits.len());
            replacements.insert(slide.part_name.as_str(), xml);
        }

        let mut archive = open_archive(&self.raw).map_err(failed)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.raw.len())));
        let zip_err = |e: zip::result::ZipError| AltTextError::CorruptPackage {
            path: self.source.clone(),
            detail: e.to_string(),
        };

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i).map_err(zip_err)?;
            match replacements.get(file.name()) {
                Some(xml) => {
                    let name = file.name().to_string();
                    drop(file);
                    let options =
                        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                    writer.start_file(name, options).map_err(zip_err)?;
                    writer
                        .write_all(xml)
                        .map_err(|e| failed(format!("write failed: {e}")))?;
                }
                None => writer.raw_copy_file(file).map_err(zip_err)?,
            }
        }

        Ok(writer.finish().map_err(zip_err)?.into_inner())
    }

    /// Write the package to `path` atomically (temp file in the same
    /// directory, then rename). Parent directories are created.
    ///
    /// # Errors
    /// [`AltTextError::OutputIsInput`] when `path` is the source file;
    /// [`AltTextError::OutputWriteFailed`] on any I/O failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AltTextError> {
        let path = path.as_ref();
        if same_file(path, &self.source) {
            return Err(AltTextError::OutputIsInput {
                path: path.to_path_buf(),
            });
        }

        let bytes = self.to_bytes()?;
        write_atomically(path, &bytes)?;
        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

fn load_slide(
    archive: &mut package::PackageArchive<'_>,
    part_name: String,
) -> Result<Slide, String> {
    let xml = read_part(archive, &part_name)?
        .ok_or_else(|| format!("slide part '{part_name}' not found"))?;
    let scanned = scan_pictures(&xml).map_err(|e| format!("{part_name}: {e}"))?;

    let rels = if scanned.is_empty() {
        HashMap::new()
    } else {
        match read_part(archive, &rels_part_for(&part_name))? {
            Some(rels_xml) => {
                parse_relationships(&rels_xml).map_err(|e| format!("{part_name} rels: {e}"))?
            }
            None => HashMap::new(),
        }
    };

    let pictures = scanned
        .into_iter()
        .map(|pic| {
            let media = media_source(archive, &part_name, &rels, &pic);
            Picture {
                shape_id: pic.shape_id,
                name: pic.name,
                alt_text: pic.descr,
                media,
            }
        })
        .collect();

    Ok(Slide {
        part_name,
        xml,
        pictures,
        edits: BTreeMap::new(),
    })
}

fn media_source(
    archive: &package::PackageArchive<'_>,
    slide_part: &str,
    rels: &HashMap<String, Relationship>,
    pic: &ScannedPicture,
) -> MediaSource {
    let rid = match (&pic.embed, &pic.link) {
        (Some(rid), _) => rid,
        (None, Some(rid)) => {
            return match rels.get(rid) {
                Some(rel) => MediaSource::External(rel.target.clone()),
                None => MediaSource::Missing(format!("linked image relationship '{rid}' not found")),
            }
        }
        (None, None) => return MediaSource::Missing("picture has no image reference".to_string()),
    };

    match rels.get(rid) {
        None => MediaSource::Missing(format!("image relationship '{rid}' not found")),
        Some(rel) if rel.external => MediaSource::External(rel.target.clone()),
        Some(rel) => {
            let part = resolve_target(slide_part, &rel.target);
            if archive.file_names().any(|name| name == part) {
                MediaSource::Embedded(part)
            } else {
                MediaSource::Missing(format!("media part '{part}' not found"))
            }
        }
    }
}

/// Whether two paths name the same file. Paths that do not exist yet are
/// compared lexically.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), AltTextError> {
    let write_failed = |source: std::io::Error| AltTextError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}
