//! Progress-callback trait for per-chunk synthesis events.
//!
//! Inject an [`Arc<dyn SynthesisProgressCallback>`] via
//! [`crate::config::StudyGuideConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the chunks. Callers forward them
//! wherever they like (progress bar, websocket, job table) without the
//! library knowing how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_studyguide::{SynthesisProgressCallback, StudyGuideConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SectionCounter {
//!     sections: AtomicUsize,
//! }
//!
//! impl SynthesisProgressCallback for SectionCounter {
//!     fn on_chunk_complete(&self, chunk_num: usize, total_chunks: usize, section_count: usize) {
//!         self.sections.fetch_add(section_count, Ordering::SeqCst);
//!         eprintln!("Part {}/{} done", chunk_num, total_chunks);
//!     }
//! }
//!
//! let counter = Arc::new(SectionCounter { sections: AtomicUsize::new(0) });
//!
//! let config = StudyGuideConfig::builder()
//!     .progress_callback(counter as Arc<dyn SynthesisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each chunk.
///
/// Chunks are processed sequentially, so events for one run never overlap,
/// but the trait is `Send + Sync` so a callback can be shared across runs and
/// moved into spawned tasks. All methods default to no-ops.
pub trait SynthesisProgressCallback: Send + Sync {
    /// Called once after chunking, before the first generation call.
    fn on_synthesis_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called before the first attempt for a chunk.
    ///
    /// # Arguments
    /// * `chunk_num`    — 1-indexed chunk number
    /// * `total_chunks` — number of chunks in the run
    fn on_chunk_start(&self, chunk_num: usize, total_chunks: usize) {
        let _ = (chunk_num, total_chunks);
    }

    /// Called before every retry (attempt ≥ 2) of a chunk.
    fn on_chunk_retry(&self, chunk_num: usize, attempt: u32, error: String) {
        let _ = (chunk_num, attempt, error);
    }

    /// Called when a chunk's response was accepted.
    ///
    /// `section_count` may be zero: the model can legitimately find nothing
    /// worth a section in a chunk.
    fn on_chunk_complete(&self, chunk_num: usize, total_chunks: usize, section_count: usize) {
        let _ = (chunk_num, total_chunks, section_count);
    }

    /// Called when a chunk fails after all attempts.
    fn on_chunk_error(&self, chunk_num: usize, total_chunks: usize, error: String) {
        let _ = (chunk_num, total_chunks, error);
    }

    /// Called once after every chunk has been attempted.
    fn on_synthesis_complete(&self, total_chunks: usize, failed_chunks: usize, total_sections: usize) {
        let _ = (total_chunks, failed_chunks, total_sections);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SynthesisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StudyGuideConfig`].
pub type ProgressCallback = Arc<dyn SynthesisProgressCallback>;
