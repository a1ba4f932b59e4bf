//! OPC package plumbing: part lookup, relationship parsing, part-name resolution.
//!
//! A `.pptx` is a zip of XML "parts" wired together by `.rels` files. Only
//! the parts needed to find pictures are parsed; everything else is carried
//! through untouched when the package is written back.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Archive over the in-memory package bytes.
pub(crate) type PackageArchive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Open a zip archive over borrowed bytes.
pub(crate) fn open_archive(bytes: &[u8]) -> Result<PackageArchive<'_>, String> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("zip container unreadable: {e}"))
}

/// Read one part fully. `Ok(None)` when the part does not exist.
pub(crate) fn read_part(
    archive: &mut PackageArchive<'_>,
    part_name: &str,
) -> Result<Option<Vec<u8>>, String> {
    let mut file = match archive.by_name(part_name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(format!("cannot open part '{part_name}': {e}")),
    };
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)
        .map_err(|e| format!("cannot read part '{part_name}': {e}"))?;
    Ok(Some(buf))
}

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub target: String,
    pub rel_type: String,
    pub external: bool,
}

impl Relationship {
    /// Whether the relationship targets a slide part (transitional or strict
    /// namespace).
    pub fn is_slide(&self) -> bool {
        self.rel_type.ends_with("/slide")
    }
}

/// Parse a `.rels` part into `Id → Relationship`.
pub(crate) fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, Relationship>, String> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_reader(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = String::new();
                let mut rel = Relationship {
                    target: String::new(),
                    rel_type: String::new(),
                    external: false,
                };
                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map_err(|e| format!("bad relationship attribute: {e}"))?;
                    match attr.key.as_ref() {
                        b"Id" => id = value.into_owned(),
                        b"Target" => rel.target = value.into_owned(),
                        b"Type" => rel.rel_type = value.into_owned(),
                        b"TargetMode" => rel.external = value.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }
                if !id.is_empty() {
                    rels.insert(id, rel);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("relationships XML error: {e}")),
            _ => {}
        }
    }

    Ok(rels)
}

/// Ordered `r:id`s from `<p:sldIdLst>` in `ppt/presentation.xml`.
pub(crate) fn parse_slide_id_list(xml: &[u8]) -> Result<Vec<String>, String> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_reader(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"sldId" =>
            {
                // `id` (numeric) and `r:id` (relationship) share a local name.
                for attr in e.attributes().flatten() {
                    if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id" {
                        let value = attr
                            .unescape_value()
                            .map_err(|e| format!("bad sldId attribute: {e}"))?;
                        ids.push(value.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("presentation.xml error: {e}")),
            _ => {}
        }
    }

    Ok(ids)
}

/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`.
pub(crate) fn rels_part_for(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_name}.rels"),
    }
}

/// Resolve a relationship target against the directory of its source part.
///
/// `("ppt/slides/slide1.xml", "../media/image1.png")` → `ppt/media/image1.png`.
/// Absolute targets (`/ppt/media/x.png`) are taken from the package root.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    let mut segments: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        match source_part.rsplit_once('/') {
            Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
            None => Vec::new(),
        }
    };

    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}
