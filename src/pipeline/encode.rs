//! Image encoding: extracted pictures → base64 [`ExtractedImage`].
//!
//! PDF image objects arrive as decoded `DynamicImage`s and are re-encoded as
//! PNG (lossless, so diagrams and small labels stay legible). PPTX media is
//! already a finished file inside the archive and is wrapped as-is.

use crate::model::ExtractedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a decoded image from `page` as a base64 PNG.
pub fn encode_image(page: u32, img: &DynamicImage) -> Result<ExtractedImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Page {}: encoded {}x{} image → {} bytes base64",
        page,
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ExtractedImage {
        page,
        mime_type: "image/png".to_string(),
        data: b64,
    })
}

/// Wrap an already-encoded media file, if its extension is a web image type.
///
/// Returns `None` for formats browsers can't show (EMF, WMF, TIFF …).
pub fn wrap_media(page: u32, file_name: &str, bytes: &[u8]) -> Option<ExtractedImage> {
    let mime_type = mime_for_extension(file_name)?;
    Some(ExtractedImage {
        page,
        mime_type: mime_type.to_string(),
        data: STANDARD.encode(bytes),
    })
}

fn mime_for_extension(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}
