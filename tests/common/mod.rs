//! Shared fixtures: build small but structurally real `.pptx` packages and
//! mock describers.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use pptx_alttext::{DescribeError, ImageDescriber, PreparedImage, Presentation};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// What a picture's image relationship points at.
#[derive(Clone)]
pub enum Media {
    /// A real PNG of the given size.
    Png(u32, u32),
    /// Bytes that no image decoder accepts.
    Corrupt,
    /// A linked (not embedded) picture.
    External,
}

#[derive(Clone)]
pub struct Pic {
    pub name: String,
    pub descr: Option<String>,
    pub media: Media,
}

pub fn pic(name: &str, w: u32, h: u32) -> Pic {
    Pic {
        name: name.to_string(),
        descr: None,
        media: Media::Png(w, h),
    }
}

pub fn captioned(name: &str, w: u32, h: u32, descr: &str) -> Pic {
    Pic {
        name: name.to_string(),
        descr: Some(descr.to_string()),
        media: Media::Png(w, h),
    }
}

pub fn corrupt(name: &str) -> Pic {
    Pic {
        name: name.to_string(),
        descr: None,
        media: Media::Corrupt,
    }
}

pub fn linked(name: &str) -> Pic {
    Pic {
        name: name.to_string(),
        descr: None,
        media: Media::External,
    }
}

pub fn png(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([30, 120, 200, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Builds a minimal PresentationML package, one slide at a time.
#[derive(Default)]
pub struct DeckBuilder {
    slides: Vec<Vec<Pic>>,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slide(mut self, pics: Vec<Pic>) -> Self {
        self.slides.push(pics);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut parts: Vec<(String, Vec<u8>)> = Vec::new();
        let mut media_count = 0;

        parts.push((
            "[Content_Types].xml".into(),
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/></Types>"#
                .to_vec(),
        ));
        parts.push((
            "_rels/.rels".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#
            )
            .into_bytes(),
        ));

        let mut sld_ids = String::new();
        let mut pres_rels = String::new();
        for (i, pics) in self.slides.iter().enumerate() {
            let n = i + 1;
            sld_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 1));
            pres_rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="{REL_SLIDE}" Target="slides/slide{n}.xml"/>"#,
                n + 1
            ));

            let mut shapes = String::from(
                r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#,
            );
            shapes.push_str(&format!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title {n}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>Slide {n}</a:t></a:r></a:p></p:txBody></p:sp>"#
            ));
            let mut slide_rels = String::new();

            for (j, pic) in pics.iter().enumerate() {
                let rid = format!("rId{}", j + 2);
                let descr = pic
                    .descr
                    .as_ref()
                    .map(|d| format!(r#" descr="{d}""#))
                    .unwrap_or_default();
                let blip_attr = match pic.media {
                    Media::External => format!(r#"r:link="{rid}""#),
                    _ => format!(r#"r:embed="{rid}""#),
                };
                shapes.push_str(&format!(
                    r#"<p:pic><p:nvPicPr><p:cNvPr id="{}" name="{}"{descr}/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip {blip_attr}/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr/></p:pic>"#,
                    j + 3,
                    pic.name
                ));

                match pic.media {
                    Media::External => slide_rels.push_str(&format!(
                        r#"<Relationship Id="{rid}" Type="{REL_IMAGE}" Target="https://example.com/linked{n}_{j}.png" TargetMode="External"/>"#
                    )),
                    Media::Png(w, h) => {
                        media_count += 1;
                        slide_rels.push_str(&format!(
                            r#"<Relationship Id="{rid}" Type="{REL_IMAGE}" Target="../media/image{media_count}.png"/>"#
                        ));
                        parts.push((format!("ppt/media/image{media_count}.png"), png(w, h)));
                    }
                    Media::Corrupt => {
                        media_count += 1;
                        slide_rels.push_str(&format!(
                            r#"<Relationship Id="{rid}" Type="{REL_IMAGE}" Target="../media/image{media_count}.png"/>"#
                        ));
                        parts.push((
                            format!("ppt/media/image{media_count}.png"),
                            b"\x89PNG\r\n\x1a\n-truncated-".to_vec(),
                        ));
                    }
                }
            }

            parts.push((
                format!("ppt/slides/slide{n}.xml"),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld {NS}><p:cSld><p:spTree>{shapes}</p:spTree></p:cSld></p:sld>"#
                )
                .into_bytes(),
            ));
            parts.push((
                format!("ppt/slides/_rels/slide{n}.xml.rels"),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>{slide_rels}</Relationships>"#
                )
                .into_bytes(),
            ));
        }

        parts.push((
            "ppt/presentation.xml".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {NS}><p:sldIdLst>{sld_ids}</p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/></p:presentation>"#
            )
            .into_bytes(),
        ));
        parts.push((
            "ppt/_rels/presentation.xml.rels".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{REL_NS}">{pres_rels}</Relationships>"#
            )
            .into_bytes(),
        ));
        parts.push((
            "ppt/slideLayouts/slideLayout1.xml".into(),
            format!(r#"<p:sldLayout {NS}><p:cSld><p:spTree/></p:cSld></p:sldLayout>"#).into_bytes(),
        ));
        parts.push(("docProps/custom.bin".into(), (0u8..=255).collect()));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in parts {
            writer.start_file(name, options).unwrap();
            writer.write_all(&data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Write the deck to `dir/name` and return its path.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Every entry's name and decompressed contents, in archive order.
pub fn entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let bytes = std::fs::read(path).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut f = archive.by_index(i).unwrap();
            let mut buf = Vec::new();
            f.read_to_end(&mut buf).unwrap();
            (f.name().to_string(), buf)
        })
        .collect()
}

/// Alt text of every picture in traversal order.
pub fn alt_texts(path: &Path) -> Vec<Option<String>> {
    let doc = Presentation::open(path).unwrap();
    doc.pictures()
        .map(|r| doc.alt_text(r).map(str::to_string))
        .collect()
}

/// Deterministic describer: the caption encodes the prepared image size.
pub struct SizeDescriber {
    pub calls: AtomicUsize,
}

impl SizeDescriber {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageDescriber for SizeDescriber {
    async fn describe_prepared(&self, image: &PreparedImage) -> Result<String, DescribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "A solid blue rectangle, {} by {} pixels.",
            image.original_width, image.original_height
        ))
    }
}

/// Every call fails as if the provider were down.
pub struct FailingDescriber;

#[async_trait]
impl ImageDescriber for FailingDescriber {
    async fn describe_prepared(&self, _image: &PreparedImage) -> Result<String, DescribeError> {
        Err(DescribeError::Llm {
            detail: "503 Service Unavailable".into(),
        })
    }
}

/// Answers only after `delay`.
pub struct SlowDescriber {
    pub delay: Duration,
}

#[async_trait]
impl ImageDescriber for SlowDescriber {
    async fn describe_prepared(&self, _image: &PreparedImage) -> Result<String, DescribeError> {
        tokio::time::sleep(self.delay).await;
        Ok("late".into())
    }
}
