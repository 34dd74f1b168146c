//! Study-guide entry points: the pipeline driver.
//!
//! Every entry point funnels into [`generate_study_guide_with_images`]:
//! the `build_*` functions first resolve and extract a document, the
//! `generate_*` functions start from text the caller already has.
//!
//! Errors are returned only when no guide can be produced at all. A run
//! where some chunks failed still returns `Ok`; check
//! [`PipelineOutcome::is_partial`].

use crate::config::StudyGuideConfig;
use crate::error::StudyGuideError;
use crate::generator::resolve_generator;
use crate::model::{
    DocumentSummary, ExtractedDocument, ImageIndex, PipelineOutcome, PipelineStats, StudyDocument,
};
use crate::pipeline::{chunk, extract, input, reconcile, synthesize};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// A page marker line as written by [`ExtractedDocument::full_text`].
static PAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^---\s*(?:slide|page)\s+\d+\s*---$").unwrap());

/// Generate a study guide from annotated text with no images.
///
/// `full_text` should carry page markers (`--- Slide N ---`) so the model
/// can label its topics.
pub async fn generate_study_guide(
    full_text: &str,
    config: &StudyGuideConfig,
) -> Result<StudyDocument, StudyGuideError> {
    let outcome = generate_study_guide_with_images(full_text, &ImageIndex::new(), config).await?;
    Ok(outcome.document)
}

/// Generate a study guide from annotated text plus the page images to attach.
///
/// # Errors
/// * [`StudyGuideError::InsufficientContent`] before any generation call
///   when the text, page markers excluded, is shorter than
///   `config.min_text_chars`.
/// * [`StudyGuideError::GenerationExhausted`] /
///   [`StudyGuideError::UnreadableDocument`] when nothing was generated.
pub async fn generate_study_guide_with_images(
    full_text: &str,
    images: &ImageIndex,
    config: &StudyGuideConfig,
) -> Result<PipelineOutcome, StudyGuideError> {
    let text_chars = annotated_text_chars(full_text);
    check_content(text_chars, config)?;

    let stats = PipelineStats {
        text_chars,
        image_count: images.image_count(),
        ..Default::default()
    };
    synthesize_text(full_text, images, stats, config).await
}

/// Build a study guide from a local PDF/PPTX path or an HTTP(S) URL.
pub async fn build_study_guide(
    input_str: impl AsRef<str>,
    config: &StudyGuideConfig,
) -> Result<PipelineOutcome, StudyGuideError> {
    let input_str = input_str.as_ref();
    info!("Building study guide: {}", input_str);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    build_from_document_bytes(resolved.bytes, &resolved.source_name, config).await
}

/// Build a study guide from PDF or PPTX bytes held in memory.
pub async fn build_study_guide_from_bytes(
    bytes: &[u8],
    config: &StudyGuideConfig,
) -> Result<PipelineOutcome, StudyGuideError> {
    build_from_document_bytes(bytes.to_vec(), "<memory>", config).await
}

/// Build a study guide and write it to `output_path` as pretty JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn build_study_guide_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &StudyGuideConfig,
) -> Result<PipelineStats, StudyGuideError> {
    let outcome = build_study_guide(input_str, config).await?;
    let path = output_path.as_ref();

    let json = serde_json::to_vec_pretty(&outcome.document)
        .map_err(|e| StudyGuideError::Internal(format!("Failed to serialise study guide: {}", e)))?;
    write_atomic(path, &json).await?;

    info!("Wrote {} sections to {}", outcome.document.len(), path.display());
    Ok(outcome.stats)
}

/// Synchronous wrapper around [`build_study_guide`].
///
/// Creates a temporary tokio runtime internally.
pub fn build_study_guide_sync(
    input_str: impl AsRef<str>,
    config: &StudyGuideConfig,
) -> Result<PipelineOutcome, StudyGuideError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| StudyGuideError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(build_study_guide(input_str, config))
}

/// Describe a document without generating anything.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentSummary, StudyGuideError> {
    let config = StudyGuideConfig::default();
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let doc = extract::extract_document(resolved.bytes, &resolved.source_name, &config).await?;
    Ok(doc.summary())
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn build_from_document_bytes(
    bytes: Vec<u8>,
    source_name: &str,
    config: &StudyGuideConfig,
) -> Result<PipelineOutcome, StudyGuideError> {
    let total_start = Instant::now();

    let extract_start = Instant::now();
    let doc: ExtractedDocument = extract::extract_document(bytes, source_name, config).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    let text_chars = doc.text_chars();
    check_content(text_chars, config)?;

    let stats = PipelineStats {
        page_count: doc.pages.len(),
        text_chars,
        image_count: doc.images.image_count(),
        extract_duration_ms,
        ..Default::default()
    };

    let mut outcome = synthesize_text(&doc.full_text(), &doc.images, stats, config).await?;
    outcome.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(outcome)
}

/// Characters of annotated text with marker lines dropped, counted the same
/// way as [`ExtractedDocument::text_chars`].
fn annotated_text_chars(full_text: &str) -> usize {
    full_text
        .lines()
        .filter(|line| !PAGE_MARKER.is_match(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .chars()
        .count()
}

fn check_content(text_chars: usize, config: &StudyGuideConfig) -> Result<(), StudyGuideError> {
    if text_chars < config.min_text_chars {
        return Err(StudyGuideError::InsufficientContent {
            chars: text_chars,
            min: config.min_text_chars,
        });
    }
    Ok(())
}

/// Chunk → synthesise → reconcile, filling in the synthesis half of `stats`.
async fn synthesize_text(
    full_text: &str,
    images: &ImageIndex,
    mut stats: PipelineStats,
    config: &StudyGuideConfig,
) -> Result<PipelineOutcome, StudyGuideError> {
    let generator = resolve_generator(config)?;

    let chunks = chunk::chunk_text(full_text, config.max_chunk_chars);
    let synthesis_start = Instant::now();
    let synthesis = synthesize::synthesize_chunks(generator.as_ref(), &chunks, config).await?;
    stats.synthesis_duration_ms = synthesis_start.elapsed().as_millis() as u64;

    let document = reconcile::reconcile(synthesis.sections, images);

    stats.total_input_tokens = synthesis.reports.iter().map(|r| r.input_tokens as u64).sum();
    stats.total_output_tokens = synthesis.reports.iter().map(|r| r.output_tokens as u64).sum();
    if stats.total_duration_ms == 0 {
        stats.total_duration_ms = stats.extract_duration_ms + stats.synthesis_duration_ms;
    }

    info!(
        "Study guide complete: {} sections, {}/{} parts ok, {} in / {} out tokens",
        document.len(),
        synthesis.chunks_attempted - synthesis.chunks_failed,
        synthesis.chunks_attempted,
        stats.total_input_tokens,
        stats.total_output_tokens
    );

    Ok(PipelineOutcome {
        document,
        chunks_attempted: synthesis.chunks_attempted,
        chunks_failed: synthesis.chunks_failed,
        chunks: synthesis.reports,
        stats,
    })
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StudyGuideError> {
    let write_err = |e| StudyGuideError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}
