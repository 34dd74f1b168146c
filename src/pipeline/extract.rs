//! Extraction entry point: sniff the container, dispatch, clean page text.

use crate::config::StudyGuideConfig;
use crate::error::StudyGuideError;
use crate::model::{ExtractedDocument, SourceFormat};
use crate::pipeline::normalize::clean_page_text;
use crate::pipeline::{pdf, pptx};
use tracing::info;

/// Identify the container format from its leading bytes.
pub fn detect_format(bytes: &[u8], source_name: &str) -> Result<SourceFormat, StudyGuideError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(SourceFormat::Pdf);
    }
    if bytes.starts_with(b"PK\x03\x04") && pptx::is_pptx(bytes) {
        return Ok(SourceFormat::Pptx);
    }

    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(StudyGuideError::UnsupportedFormat {
        source_name: source_name.to_string(),
        magic,
    })
}

/// Extract page text and images from a PDF or PPTX held in memory.
///
/// Parsing runs on the blocking pool. Every page's text is passed through
/// [`clean_page_text`] before it is returned.
pub async fn extract_document(
    bytes: Vec<u8>,
    source_name: &str,
    config: &StudyGuideConfig,
) -> Result<ExtractedDocument, StudyGuideError> {
    let format = detect_format(&bytes, source_name)?;
    let name = source_name.to_string();
    let password = config.password.clone();
    let min_side = config.min_image_side;

    let mut doc = tokio::task::spawn_blocking(move || match format {
        SourceFormat::Pdf => pdf::extract_pdf(&bytes, &name, password.as_deref(), min_side),
        SourceFormat::Pptx => pptx::extract_pptx(&bytes, &name, min_side),
    })
    .await
    .map_err(|e| StudyGuideError::Internal(format!("Extraction task panicked: {}", e)))??;

    for page in &mut doc.pages {
        page.text = clean_page_text(&page.text);
    }

    info!(
        "Extracted {} '{}': {} {}s, {} chars, {} images",
        doc.format,
        source_name,
        doc.pages.len(),
        doc.format.unit_label().to_lowercase(),
        doc.text_chars(),
        doc.images.image_count()
    );
    Ok(doc)
}
