//! Chunking: split the annotated document text into model-sized pieces.
//!
//! Chunk boundaries always fall on line breaks. Page markers sit on their
//! own lines, so a marker is never cut in half and every chunk still tells
//! the model which page its text came from. Chunk count equals the number of
//! generation calls, so `max_chars` is the knob that trades request size
//! against request count.

use tracing::debug;

/// Split `text` into line-aligned chunks of at most `max_chars` characters.
///
/// Lines keep their original terminators. A line that alone exceeds
/// `max_chars` becomes its own oversized chunk instead of being broken.
/// A final chunk containing only whitespace is dropped.
///
/// Length is counted in `char`s, not bytes.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for line in text.split_inclusive('\n') {
        let line_chars = line.chars().count();
        if current_chars + line_chars > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(line);
        current_chars += line_chars;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    debug!(
        "Chunked {} chars into {} chunks (max {} chars)",
        text.chars().count(),
        chunks.len(),
        max_chars
    );
    chunks
}
