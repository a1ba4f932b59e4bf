//! Slide XML: find picture shapes and rewrite their `descr` attribute.
//!
//! Scanning and rewriting walk the slide with the same [`PictureWalker`], so
//! picture ordinals assigned while scanning are exactly the ones matched
//! while rewriting. Every event the rewriter does not target is written back
//! verbatim.

use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A `<p:pic>` as found in slide XML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ScannedPicture {
    pub shape_id: Option<String>,
    pub name: String,
    pub descr: Option<String>,
    /// `r:embed` on the first `<a:blip>`.
    pub embed: Option<String>,
    /// `r:link` on the first `<a:blip>` (linked, not embedded, picture).
    pub link: Option<String>,
}

enum Hit {
    PictureStart,
    NonVisualProps(usize),
    Blip(usize),
}

/// Tracks where the reader is relative to picture shapes.
///
/// Pictures are numbered in document order, which covers pictures nested in
/// group shapes and placeholder pictures. Content under `<mc:Fallback>` is
/// an alternative rendering of a `<mc:Choice>` and is never counted.
#[derive(Default)]
struct PictureWalker {
    fallback_depth: usize,
    current: Option<usize>,
    in_nv_pic_pr: bool,
    seen_blip: bool,
    next_ordinal: usize,
}

impl PictureWalker {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Option<Hit> {
        let local = e.local_name();
        match local.as_ref() {
            b"Fallback" => {
                if !empty {
                    self.fallback_depth += 1;
                }
                None
            }
            _ if self.fallback_depth > 0 => None,
            b"pic" if !empty && self.current.is_none() => {
                let ordinal = self.next_ordinal;
                self.next_ordinal += 1;
                self.current = Some(ordinal);
                self.seen_blip = false;
                Some(Hit::PictureStart)
            }
            b"nvPicPr" if !empty && self.current.is_some() => {
                self.in_nv_pic_pr = true;
                None
            }
            b"cNvPr" if self.in_nv_pic_pr => self.current.map(Hit::NonVisualProps),
            b"blip" if self.current.is_some() && !self.seen_blip => {
                self.seen_blip = true;
                self.current.map(Hit::Blip)
            }
            _ => None,
        }
    }

    fn close(&mut self, local: &[u8]) {
        match local {
            b"Fallback" => self.fallback_depth = self.fallback_depth.saturating_sub(1),
            _ if self.fallback_depth > 0 => {}
            b"pic" => {
                self.current = None;
                self.in_nv_pic_pr = false;
            }
            b"nvPicPr" => self.in_nv_pic_pr = false,
            _ => {}
        }
    }
}

/// Collect every picture shape on a slide, in document order.
pub(crate) fn scan_pictures(xml: &[u8]) -> Result<Vec<ScannedPicture>, String> {
    let mut reader = Reader::from_reader(xml);
    let mut walker = PictureWalker::default();
    let mut pictures: Vec<ScannedPicture> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("slide XML error at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                match walker.open(e, empty) {
                    Some(Hit::PictureStart) => pictures.push(ScannedPicture::default()),
                    Some(Hit::NonVisualProps(i)) => {
                        if let Some(pic) = pictures.get_mut(i) {
                            read_non_visual_props(e, pic)?;
                        }
                    }
                    Some(Hit::Blip(i)) => {
                        if let Some(pic) = pictures.get_mut(i) {
                            read_blip(e, pic)?;
                        }
                    }
                    None => {}
                }
            }
            Event::End(ref e) => walker.close(e.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(pictures)
}

fn read_non_visual_props(e: &BytesStart<'_>, pic: &mut ScannedPicture) -> Result<(), String> {
    for attr in e.attributes().with_checks(false).flatten() {
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad cNvPr attribute: {e}"))?
            .into_owned();
        match attr.key.as_ref() {
            b"id" => pic.shape_id = Some(value),
            b"name" => pic.name = value,
            b"descr" => pic.descr = Some(value),
            _ => {}
        }
    }
    Ok(())
}

fn read_blip(e: &BytesStart<'_>, pic: &mut ScannedPicture) -> Result<(), String> {
    for attr in e.attributes().with_checks(false).flatten() {
        if attr.key.prefix().is_none() {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad blip attribute: {e}"))?
            .into_owned();
        match attr.key.local_name().as_ref() {
            b"embed" => pic.embed = Some(value),
            b"link" => pic.link = Some(value),
            _ => {}
        }
    }
    Ok(())
}

/// Rewrite slide XML, setting `descr` on the pictures named in `edits`
/// (ordinal → new alt text). All other bytes are carried through.
pub(crate) fn rewrite_alt_text(xml: &[u8], edits: &BTreeMap<usize, String>) -> Result<Vec<u8>, String> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));
    let mut walker = PictureWalker::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("slide XML error at byte {}: {e}", reader.buffer_position()))?;
        let out = match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                match walker.open(e, empty) {
                    Some(Hit::NonVisualProps(i)) if edits.contains_key(&i) => {
                        let text = &edits[&i];
                        let replaced = with_descr(e, text);
                        if empty {
                            Event::Empty(replaced)
                        } else {
                            Event::Start(replaced)
                        }
                    }
                    _ => event,
                }
            }
            Event::End(ref e) => {
                walker.close(e.local_name().as_ref());
                event
            }
            Event::Eof => break,
            other => other,
        };
        writer
            .write_event(out)
            .map_err(|e| format!("slide XML write failed: {e}"))?;
    }

    Ok(writer.into_inner())
}

/// Copy of `e` with `descr` replaced (in place) or appended.
fn with_descr(e: &BytesStart<'_>, text: &str) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut replaced = false;

    for attr in e.attributes().with_checks(false).flatten() {
        if attr.key.as_ref() == b"descr" {
            out.push_attribute(descr_attribute(text));
            replaced = true;
        } else {
            out.push_attribute(attr);
        }
    }
    if !replaced {
        out.push_attribute(descr_attribute(text));
    }
    out
}

/// Escaped `descr="…"`. Newlines become `&#xA;` so attribute-value
/// normalisation does not turn them into spaces on the next read.
fn descr_attribute(text: &str) -> Attribute<'static> {
    let sanitized: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();
    let escaped = escape(sanitized.as_str())
        .replace('\n', "&#xA;")
        .replace('\t', "&#x9;");
    Attribute {
        key: QName(b"descr"),
        value: Cow::Owned(escaped.into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><p:cSld><p:spTree>
<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1" descr="not a picture"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr></p:sp>
<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture 3" descr="A &amp; B"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/></p:blipFill></p:pic>
<p:grpSp><p:nvGrpSpPr><p:cNvPr id="5" name="Group 4"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
<p:pic><p:nvPicPr><p:cNvPr id="6" name="Picture 5"><a:hlinkClick r:id=""/></p:cNvPr><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:link="rId9"/></p:blipFill></p:pic>
</p:grpSp>
<mc:AlternateContent><mc:Choice Requires="p14"><p:pic><p:nvPicPr><p:cNvPr id="7" name="Picture 6"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId3"/></p:blipFill></p:pic></mc:Choice>
<mc:Fallback><p:pic><p:nvPicPr><p:cNvPr id="7" name="Picture 6"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId4"/></p:blipFill></p:pic></mc:Fallback></mc:AlternateContent>
</p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn scan_finds_pictures_in_groups_but_not_fallbacks() {
        let pics = scan_pictures(SLIDE.as_bytes()).unwrap();
        assert_eq!(pics.len(), 3);

        assert_eq!(pics[0].name, "Picture 3");
        assert_eq!(pics[0].shape_id.as_deref(), Some("4"));
        assert_eq!(pics[0].descr.as_deref(), Some("A & B"));
        assert_eq!(pics[0].embed.as_deref(), Some("rId2"));

        assert_eq!(pics[1].name, "Picture 5");
        assert_eq!(pics[1].descr, None);
        assert_eq!(pics[1].embed, None);
        assert_eq!(pics[1].link.as_deref(), Some("rId9"));

        assert_eq!(pics[2].embed.as_deref(), Some("rId3"));
    }

    #[test]
    fn rewrite_without_edits_is_byte_identical() {
        let out = rewrite_alt_text(SLIDE.as_bytes(), &BTreeMap::new()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), SLIDE);
    }

    #[test]
    fn rewrite_adds_and_replaces_descr() {
        let mut edits = BTreeMap::new();
        edits.insert(0, "Chart \"Q3\" <final>".to_string());
        edits.insert(1, "Line one\nLine two".to_string());

        let out = rewrite_alt_text(SLIDE.as_bytes(), &edits).unwrap();
        let pics = scan_pictures(&out).unwrap();

        assert_eq!(pics[0].descr.as_deref(), Some("Chart \"Q3\" <final>"));
        assert_eq!(pics[1].descr.as_deref(), Some("Line one\nLine two"));
        assert_eq!(pics[2].descr, None);

        // Non-picture shapes keep their attributes.
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#"name="Title 1" descr="not a picture""#));
        // The element with children stays a start tag.
        assert!(text.contains("<a:hlinkClick r:id=\"\"/></p:cNvPr>"));
    }

    #[test]
    fn control_characters_are_dropped() {
        let mut edits = BTreeMap::new();
        edits.insert(2, "bell\u{7} and tab\tend".to_string());
        let out = rewrite_alt_text(SLIDE.as_bytes(), &edits).unwrap();
        let pics = scan_pictures(&out).unwrap();
        assert_eq!(pics[2].descr.as_deref(), Some("bell and tab\tend"));
    }

    #[test]
    fn malformed_slide_is_an_error() {
        assert!(scan_pictures(b"<p:sld><p:pic></p:sld>").is_err());
    }
}
