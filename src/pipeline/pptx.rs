//! PPTX extraction: slide text and pictures straight from the OOXML package.
//!
//! A `.pptx` is a ZIP archive. Slide order comes from `ppt/presentation.xml`
//! (`p:sldIdLst`) resolved through its relationships part. Slide file names
//! are not a reliable order once slides have been moved. Each slide's text
//! is the concatenation of its `a:t` runs, one line per `a:p` paragraph;
//! pictures are the `a:blip r:embed` targets, in the order they appear on
//! the slide.

use crate::error::StudyGuideError;
use crate::model::{ExtractedDocument, ExtractedImage, ImageIndex, PageText, SourceFormat};
use crate::pipeline::encode::wrap_media;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde::Deserialize;
use std::io::{Cursor, Read, Seek};
use tracing::{debug, warn};
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

static RE_SLIDE_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());

/// `true` if `bytes` is a ZIP archive containing a presentation part.
pub fn is_pptx(bytes: &[u8]) -> bool {
    match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive.file_names().any(|n| n == PRESENTATION_PART),
        Err(_) => false,
    }
}

/// Extract slide text and images from a PPTX package.
///
/// Slides are numbered 1.. in presentation order. Pictures smaller than
/// `min_image_side` on either axis are dropped when their size can be read.
pub fn extract_pptx(
    bytes: &[u8],
    source_name: &str,
    min_image_side: u32,
) -> Result<ExtractedDocument, StudyGuideError> {
    let corrupt = |detail: String| StudyGuideError::CorruptDocument {
        source_name: source_name.to_string(),
        detail,
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(e.to_string()))?;
    let slide_parts = slide_parts_in_order(&mut archive);
    debug!("PPTX '{}': {} slides", source_name, slide_parts.len());

    let mut pages = Vec::with_capacity(slide_parts.len());
    let mut images = ImageIndex::new();

    for (idx, part) in slide_parts.iter().enumerate() {
        let slide_num = idx as u32 + 1;
        let xml = read_part(&mut archive, part)
            .ok_or_else(|| corrupt(format!("missing slide part '{part}'")))?;
        let slide = parse_slide(&xml).map_err(|e| corrupt(format!("{part}: {e}")))?;

        let rels = read_rels(&mut archive, &rels_path_for(part));
        for embed in &slide.embeds {
            let Some(rel) = rels.iter().find(|r| &r.id == embed) else {
                warn!("Slide {}: image relationship {} not found", slide_num, embed);
                continue;
            };
            if rel.target_mode.as_deref() == Some("External") {
                continue;
            }
            let media_path = resolve_part_path(part_dir(part), &rel.target);
            if let Some(image) = load_media(&mut archive, slide_num, &media_path, min_image_side) {
                images.push(image);
            }
        }

        pages.push(PageText {
            page: slide_num,
            text: slide.text,
        });
    }

    Ok(ExtractedDocument {
        format: SourceFormat::Pptx,
        pages,
        images,
    })
}

// ── Slide order ──────────────────────────────────────────────────────────────

/// Slide part names in presentation order, falling back to numeric file order.
fn slide_parts_in_order<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Vec<String> {
    if let Some(ordered) = slide_parts_from_presentation(archive) {
        if !ordered.is_empty() {
            return ordered;
        }
    }

    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let caps = RE_SLIDE_PART.captures(name)?;
            let n = caps[1].parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);
    numbered.into_iter().map(|(_, name)| name).collect()
}

fn slide_parts_from_presentation<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Option<Vec<String>> {
    let xml = read_part(archive, PRESENTATION_PART)?;
    let rels = read_rels(archive, PRESENTATION_RELS);

    let mut reader = Reader::from_str(&xml);
    let mut ids = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sldId" =>
            {
                if let Some(rid) = prefixed_attr(e, b"id") {
                    ids.push(rid);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("presentation.xml unreadable, using file order: {}", e);
                return None;
            }
            _ => {}
        }
    }

    let parts = ids
        .iter()
        .filter_map(|rid| rels.iter().find(|r| &r.id == rid))
        .map(|r| resolve_part_path("ppt", &r.target))
        .filter(|p| archive.index_for_name(p).is_some())
        .collect();
    Some(parts)
}

// ── Slide content ────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct SlideContent {
    text: String,
    /// Relationship ids of embedded pictures, in document order.
    embeds: Vec<String>,
}

fn parse_slide(xml: &str) -> Result<SlideContent, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut content = SlideContent::default();
    let mut line = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"blip" => push_embed(e, &mut content.embeds),
                _ => {}
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"br" => line.push('\n'),
                b"blip" => push_embed(e, &mut content.embeds),
                _ => {}
            },
            Event::Text(ref t) if in_text => {
                line.push_str(&t.unescape()?);
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        content.text.push_str(trimmed);
                        content.text.push('\n');
                    }
                    line.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(content)
}

fn push_embed(e: &BytesStart<'_>, embeds: &mut Vec<String>) {
    if let Some(rid) = prefixed_attr(e, b"embed") {
        embeds.push(rid);
    }
}

/// Value of a namespace-prefixed attribute (`r:id`, `r:embed`) by local name.
fn prefixed_attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        let key = attr.key;
        if key.prefix().is_some() && key.local_name().as_ref() == local {
            attr.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

// ── Relationships ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct Relationships {
    #[serde(rename = "Relationship", default)]
    items: Vec<Relationship>,
}

#[derive(Debug, Clone, Deserialize)]
struct Relationship {
    #[serde(rename = "@Id")]
    id: String,
    #[serde(rename = "@Target")]
    target: String,
    #[serde(rename = "@TargetMode", default)]
    target_mode: Option<String>,
}

fn read_rels<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Vec<Relationship> {
    let Some(xml) = read_part(archive, path) else {
        return Vec::new();
    };
    match quick_xml::de::from_str::<Relationships>(&xml) {
        Ok(rels) => rels.items,
        Err(e) => {
            warn!("Ignoring unreadable relationships part '{}': {}", path, e);
            Vec::new()
        }
    }
}

/// `ppt/slides/slide3.xml` → `ppt/slides/_rels/slide3.xml.rels`
fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_part_path(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
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

// ── Archive access ───────────────────────────────────────────────────────────

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<String> {
    let mut file = archive.by_name(path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    Some(contents)
}

fn read_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<Vec<u8>> {
    let mut file = archive.by_name(path).ok()?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).ok()?;
    Some(buf)
}

fn load_media<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    slide_num: u32,
    path: &str,
    min_side: u32,
) -> Option<ExtractedImage> {
    let bytes = read_bytes(archive, path)?;
    if let Some((w, h)) = image_dimensions(&bytes) {
        if w < min_side || h < min_side {
            debug!("Slide {}: skipping {}x{} image '{}'", slide_num, w, h, path);
            return None;
        }
    }
    let image = wrap_media(slide_num, path, &bytes);
    if image.is_none() {
        debug!("Slide {}: unsupported media type '{}'", slide_num, path);
    }
    image
}

/// Pixel size if the format is one the `image` crate can probe.
fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
