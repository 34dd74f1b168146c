//! PDF extraction: per-page text and embedded pictures via pdfium.
//!
//! pdfium holds thread-local state and every call blocks, so callers run
//! [`extract_pdf`] inside `tokio::task::spawn_blocking`.
//!
//! Pictures are the page's image objects decoded to bitmaps and re-encoded
//! as PNG. Nothing is rasterised: a page with no embedded pictures gets no
//! images, and vector drawings are not captured.

use crate::error::StudyGuideError;
use crate::model::{ExtractedDocument, ImageIndex, PageText, SourceFormat};
use crate::pipeline::encode::encode_image;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Bind to a pdfium library.
///
/// `PDFIUM_LIB_PATH` may name the library file itself or the directory
/// holding it. Without it, the current directory and then the system
/// library search path are tried.
pub fn bind_pdfium() -> Result<Pdfium, StudyGuideError> {
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(&p);
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path
        };
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| StudyGuideError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e)));
    }

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| StudyGuideError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Extract text and images from every page of a PDF held in memory.
///
/// Blocking. Images smaller than `min_image_side` on either axis are
/// skipped; so are image objects pdfium cannot decode.
pub fn extract_pdf(
    bytes: &[u8],
    source_name: &str,
    password: Option<&str>,
    min_image_side: u32,
) -> Result<ExtractedDocument, StudyGuideError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| map_load_error(e, source_name, password.is_some()))?;

    let page_count = document.pages().len();
    info!("PDF '{}' loaded: {} pages", source_name, page_count);

    let mut pages = Vec::with_capacity(page_count as usize);
    let mut images = ImageIndex::new();

    for (idx, page) in document.pages().iter().enumerate() {
        let page_num = idx as u32 + 1;

        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!("Page {}: text extraction failed: {:?}", page_num, e);
                String::new()
            }
        };

        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let raw = match image_object.get_raw_image() {
                Ok(img) => img,
                Err(e) => {
                    debug!("Page {}: undecodable image object: {:?}", page_num, e);
                    continue;
                }
            };
            if raw.width() < min_image_side || raw.height() < min_image_side {
                debug!(
                    "Page {}: skipping {}x{} image",
                    page_num,
                    raw.width(),
                    raw.height()
                );
                continue;
            }
            match encode_image(page_num, &raw) {
                Ok(image) => images.push(image),
                Err(e) => warn!("Page {}: failed to encode image: {}", page_num, e),
            }
        }

        pages.push(PageText {
            page: page_num,
            text,
        });
    }

    Ok(ExtractedDocument {
        format: SourceFormat::Pdf,
        pages,
        images,
    })
}

fn map_load_error(e: PdfiumError, source_name: &str, had_password: bool) -> StudyGuideError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            StudyGuideError::WrongPassword {
                source_name: source_name.to_string(),
            }
        } else {
            StudyGuideError::PasswordRequired {
                source_name: source_name.to_string(),
            }
        }
    } else {
        StudyGuideError::CorruptDocument {
            source_name: source_name.to_string(),
            detail: err_str,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_errors_are_classified() {
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert!(matches!(
            map_load_error(e, "a.pdf", false),
            StudyGuideError::PasswordRequired { .. }
        ));
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert!(matches!(
            map_load_error(e, "a.pdf", true),
            StudyGuideError::WrongPassword { .. }
        ));
    }

    #[test]
    fn other_load_errors_are_corruption() {
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError);
        match map_load_error(e, "broken.pdf", false) {
            StudyGuideError::CorruptDocument { source_name, .. } => {
                assert_eq!(source_name, "broken.pdf")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
