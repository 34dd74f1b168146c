//! Pipeline stages for document-to-study-guide synthesis.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the orchestrator never sees a file format.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ normalize ──▶ chunk ──▶ synthesize ──▶ reconcile
//! (URL/path) (pdf/pptx)  (cleanup)    (lines)   (LLM, retry)   (images)
//! ```
//!
//! 1. [`input`]      — read the local file or download the URL into memory
//! 2. [`extract`]    — sniff the container and dispatch to [`pdf`] or
//!    [`pptx`]; runs in `spawn_blocking`. [`encode`] turns pictures into
//!    base64 payloads
//! 3. [`normalize`]  — deterministic cleanup of page text and model output
//! 4. [`chunk`]      — line-aligned split of the annotated text
//! 5. [`synthesize`] — one generation call per chunk with bounded retries;
//!    talks to the LLM provider (URL downloads in [`input`] are the only
//!    other network I/O)
//! 6. [`reconcile`]  — attach each page's images to the sections citing it

pub mod chunk;
pub mod encode;
pub mod extract;
pub mod input;
pub mod normalize;
pub mod pdf;
pub mod pptx;
pub mod reconcile;
pub mod synthesize;
