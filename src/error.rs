//! Error types for the edgequake-studyguide library.
//!
//! Three error types map onto the three levels at which things go wrong:
//!
//! * [`StudyGuideError`] — **Fatal**: the study guide cannot be produced at
//!   all (unsupported file, too little text, every chunk failed). Returned as
//!   `Err(StudyGuideError)` from the top-level `build_*` / `generate_*`
//!   functions.
//!
//! * [`ChunkError`] — **Non-fatal**: one chunk exhausted its attempts but the
//!   rest of the document is fine. Stored inside
//!   [`crate::model::ChunkReport`] so callers can see exactly which parts of
//!   the source are missing from a partial guide.
//!
//! * [`GenerationError`] — **Transient**: a single generation attempt failed.
//!   Absorbed by the retry loop; only its text survives, as the `detail` of a
//!   [`ChunkError`] once a chunk runs out of attempts.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-studyguide library.
#[derive(Debug, Error)]
pub enum StudyGuideError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are neither a PDF nor a PowerPoint (PPTX) deck.
    #[error("Unsupported document '{source_name}': only PDF and PPTX files are supported (first bytes: {magic:?})")]
    UnsupportedFormat { source_name: String, magic: [u8; 4] },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The container was recognised but could not be parsed.
    #[error("Document '{source_name}' is corrupt: {detail}")]
    CorruptDocument { source_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{source_name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{source_name}'")]
    WrongPassword { source_name: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    /// Extracted text is below the minimum usable length.
    ///
    /// Raised before any generation call is made.
    #[error("Not enough text to build a study guide: extracted {chars} characters, need at least {min}.\nScanned or image-only documents are not supported.")]
    InsufficientContent { chars: usize, min: usize },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every chunk failed all attempts; nothing was generated.
    #[error("Failed to generate study guide: {processed}/{total} parts processed. Every attempt failed — check your network connection and API key.\nFirst error: {first_error}")]
    GenerationExhausted {
        processed: usize,
        total: usize,
        first_error: String,
    },

    /// Every chunk was processed but the model produced no sections.
    #[error("The document appears to be unreadable: no study content could be generated from it.")]
    UnreadableDocument,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk.
///
/// The run continues unless no chunk produced any section.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// Every attempt for this chunk failed.
    #[error("Part {chunk}: generation failed after {attempts} attempts: {detail}")]
    Exhausted {
        chunk: usize,
        attempts: u32,
        detail: String,
    },
}

/// Failure of one generation attempt. Always retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Network, HTTP or provider failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not finish within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered with an empty body.
    #[error("empty response")]
    EmptyResponse,

    /// The body is not valid JSON for the response schema.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The body parsed but violates the schema's constraints.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_display_reports_processed_over_total() {
        let e = StudyGuideError::GenerationExhausted {
            processed: 0,
            total: 3,
            first_error: "timed out after 120s".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("0/3"), "got: {msg}");
        assert!(msg.contains("timed out"), "got: {msg}");
    }

    #[test]
    fn unreadable_display_is_distinct_from_exhausted() {
        let msg = StudyGuideError::UnreadableDocument.to_string();
        assert!(msg.contains("unreadable"), "got: {msg}");
        assert!(!msg.contains("parts processed"));
    }

    #[test]
    fn insufficient_content_display() {
        let e = StudyGuideError::InsufficientContent { chars: 12, min: 50 };
        let msg = e.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn chunk_error_display() {
        let e = ChunkError::Exhausted {
            chunk: 2,
            attempts: 3,
            detail: "empty response".into(),
        };
        assert_eq!(
            e.to_string(),
            "Part 2: generation failed after 3 attempts: empty response"
        );
    }

    #[test]
    fn chunk_error_roundtrips_through_json() {
        let e = ChunkError::Exhausted {
            chunk: 1,
            attempts: 3,
            detail: "x".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: ChunkError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
