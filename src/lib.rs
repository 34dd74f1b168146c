//! # edgequake-studyguide
//!
//! Turn lecture decks (PPTX) and PDFs into bilingual study guides with LLMs.
//!
//! Each guide is a list of sections, one per topic, in document order. A
//! section carries English study notes with Chinese translations, an
//! optional summary of the page's visuals, multiple-choice exam questions,
//! and the pictures from the page the topic came from.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PPTX
//!  │
//!  ├─ 1. Input      read local file or download from URL
//!  ├─ 2. Extract    page text + embedded images (pdfium / zip + quick-xml)
//!  ├─ 3. Normalize  line endings, invisible characters, blank lines
//!  ├─ 4. Chunk      line-aligned pieces of at most max_chunk_chars
//!  ├─ 5. Synthesize one LLM call per chunk, up to 3 attempts each
//!  └─ 6. Reconcile  attach "Slide N" images to the sections citing them
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_studyguide::{build_study_guide, StudyGuideConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = StudyGuideConfig::default();
//!     let outcome = build_study_guide("lecture.pptx", &config).await?;
//!     for section in outcome.document.sections() {
//!         println!("{} ({} questions)", section.topic, section.questions.len());
//!     }
//!     if outcome.is_partial() {
//!         eprintln!("{} of {} parts failed", outcome.chunks_failed, outcome.chunks_attempted);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Bring your own model
//!
//! Anything implementing [`StudyGuideGenerator`] can be injected with
//! [`StudyGuideConfigBuilder::generator`]; otherwise an `edgequake_llm`
//! provider is resolved from the config and environment.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `studyguide` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-studyguide = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generator;
pub mod guide;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{StudyGuideConfig, StudyGuideConfigBuilder, MAX_ATTEMPTS_PER_CHUNK};
pub use error::{ChunkError, GenerationError, StudyGuideError};
pub use generator::{GenerationResponse, LlmGenerator, StudyGuideGenerator, DEFAULT_MODEL};
pub use guide::{
    build_study_guide, build_study_guide_from_bytes, build_study_guide_sync,
    build_study_guide_to_file, generate_study_guide, generate_study_guide_with_images, inspect,
};
pub use model::{
    ChunkReport, ContentPoint, DocumentSummary, ExamQuestion, ExtractedDocument, ExtractedImage,
    ImageIndex, ImageRef, PageText, PipelineOutcome, PipelineStats, RawSection, SourceFormat,
    StudyDocument, StudySection,
};
pub use pipeline::chunk::chunk_text;
pub use pipeline::reconcile::{page_reference, reconcile};
pub use progress::{NoopProgressCallback, ProgressCallback, SynthesisProgressCallback};
