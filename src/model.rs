//! Data model shared by every pipeline stage.
//!
//! Two groups of types live here:
//!
//! * **Source side** — [`PageText`], [`ExtractedImage`], [`ImageIndex`] and
//!   [`ExtractedDocument`] describe what came out of the PDF/PPTX.
//! * **Guide side** — [`RawSection`] is what the model emits per topic,
//!   [`StudySection`] adds the reconciled images, and [`StudyDocument`] is
//!   the finished, immutable guide wrapped in a [`PipelineOutcome`].
//!
//! Field names serialise in camelCase because the same shapes are sent to the
//! model as the response schema (see [`crate::prompts::response_schema`]).

use crate::error::ChunkError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ── Source side ──────────────────────────────────────────────────────────

/// Container format of the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Pptx,
}

impl SourceFormat {
    /// Word used in page markers: `--- Slide 3 ---` or `--- Page 3 ---`.
    pub fn unit_label(self) -> &'static str {
        match self {
            SourceFormat::Pdf => "Page",
            SourceFormat::Pptx => "Slide",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Pdf => f.write_str("PDF"),
            SourceFormat::Pptx => f.write_str("PPTX"),
        }
    }
}

/// Raw text of one page or slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page/slide number.
    pub page: u32,
    pub text: String,
}

/// An image found on a page or slide, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedImage {
    /// 1-indexed page/slide the image was found on.
    pub page: u32,
    /// e.g. `image/png`.
    pub mime_type: String,
    /// Base64 payload (standard alphabet, padded).
    pub data: String,
}

impl ExtractedImage {
    /// Render as a `data:` URI for HTML/Markdown consumers.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Shared handle to an extracted image.
///
/// Sections hold clones of the handle, never copies of the bytes.
pub type ImageRef = Arc<ExtractedImage>;

/// Page number → images on that page, in page order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageIndex {
    pages: BTreeMap<u32, Vec<ImageRef>>,
}

impl ImageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an image to the list for its page.
    pub fn push(&mut self, image: ExtractedImage) {
        self.pages
            .entry(image.page)
            .or_default()
            .push(Arc::new(image));
    }

    /// Images on `page`; empty if the page has none.
    pub fn get(&self, page: u32) -> &[ImageRef] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of images across all pages.
    pub fn image_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    /// Pages that carry at least one image, ascending.
    pub fn pages_with_images(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|(_, imgs)| !imgs.is_empty())
            .map(|(p, _)| *p)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.image_count() == 0
    }
}

impl FromIterator<ExtractedImage> for ImageIndex {
    fn from_iter<I: IntoIterator<Item = ExtractedImage>>(iter: I) -> Self {
        let mut index = ImageIndex::new();
        for image in iter {
            index.push(image);
        }
        index
    }
}

/// Everything extracted from one source document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub format: SourceFormat,
    /// Pages in ascending order.
    pub pages: Vec<PageText>,
    pub images: ImageIndex,
}

impl ExtractedDocument {
    /// Concatenate all pages, each preceded by a page marker.
    ///
    /// The markers (`--- Slide N ---`) are what lets the model label each
    /// section with the page it came from, which reconciliation later uses
    /// to attach images.
    pub fn full_text(&self) -> String {
        let label = self.format.unit_label();
        let mut out = String::new();
        for page in &self.pages {
            out.push_str(&format!("--- {} {} ---\n", label, page.page));
            out.push_str(page.text.trim_end());
            out.push_str("\n\n");
        }
        out
    }

    /// Characters of real page text, markers excluded.
    pub fn text_chars(&self) -> usize {
        self.pages.iter().map(|p| p.text.trim().chars().count()).sum()
    }

    /// Lightweight description, no generation involved.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            format: self.format,
            page_count: self.pages.len(),
            text_chars: self.text_chars(),
            image_count: self.images.image_count(),
            pages_with_images: self.images.pages_with_images(),
        }
    }
}

/// Result of [`crate::guide::inspect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub format: SourceFormat,
    pub page_count: usize,
    pub text_chars: usize,
    pub image_count: usize,
    pub pages_with_images: Vec<u32>,
}

// ── Guide side ───────────────────────────────────────────────────────────

/// One bilingual note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPoint {
    pub english: String,
    pub chinese: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_term: Option<String>,
}

/// A four-option multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub question: String,
    pub options: [String; 4],
    /// Index into `options`, `0..=3`.
    pub correct_index: u8,
    pub explanation: String,
}

impl ExamQuestion {
    /// The text of the correct option, if `correct_index` is in range.
    pub fn correct_option(&self) -> Option<&str> {
        self.options
            .get(self.correct_index as usize)
            .map(String::as_str)
    }
}

/// One topic as emitted by the model for a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSection {
    /// Expected (not guaranteed) to contain a `Slide N` / `Page N` marker.
    pub topic: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content_points: Vec<ContentPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_summary: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub questions: Vec<ExamQuestion>,
}

/// Models write `null` for lists they have nothing to put in.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The JSON envelope the model must return for each chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionsEnvelope {
    pub sections: Vec<RawSection>,
}

/// A [`RawSection`] with its images attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySection {
    pub topic: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content_points: Vec<ContentPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub questions: Vec<ExamQuestion>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

impl StudySection {
    pub fn from_raw(raw: RawSection, images: Vec<ImageRef>) -> Self {
        Self {
            topic: raw.topic,
            content_points: raw.content_points,
            visual_summary: raw.visual_summary,
            questions: raw.questions,
            images,
        }
    }
}

/// The finished study guide: sections in document order.
///
/// There is no mutating API; once built the order is fixed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyDocument {
    sections: Vec<StudySection>,
}

impl StudyDocument {
    pub(crate) fn new(sections: Vec<StudySection>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[StudySection] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StudySection> {
        self.sections.iter()
    }

    /// All questions across sections, in document order.
    pub fn questions(&self) -> impl Iterator<Item = &ExamQuestion> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }

    pub fn into_sections(self) -> Vec<StudySection> {
        self.sections
    }
}

impl<'a> IntoIterator for &'a StudyDocument {
    type Item = &'a StudySection;
    type IntoIter = std::slice::Iter<'a, StudySection>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}

/// What happened to one chunk during synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReport {
    /// 1-indexed position among all chunks.
    pub chunk_num: usize,
    /// Generation calls made for this chunk (1..=3).
    pub attempts: u32,
    /// Sections this chunk contributed.
    pub section_count: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// `Some` when every attempt failed.
    pub error: Option<ChunkError>,
}

impl ChunkReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate numbers for a full run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub page_count: usize,
    pub text_chars: usize,
    pub image_count: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extract_duration_ms: u64,
    pub synthesis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Final result of a successful run (possibly partial).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub document: StudyDocument,
    pub chunks_attempted: usize,
    pub chunks_failed: usize,
    pub chunks: Vec<ChunkReport>,
    pub stats: PipelineStats,
}

impl PipelineOutcome {
    /// True when some chunk's content is missing from the guide.
    pub fn is_partial(&self) -> bool {
        self.chunks_failed > 0
    }
}
