//! Normalisation: deterministic cleanup of extracted text and model output.
//!
//! Two independent rule sets:
//!
//! * [`clean_page_text`] runs on every extracted page before chunking, so
//!   chunk sizes reflect real content and not CRLF pairs, zero-width spaces
//!   or runs of blank lines left behind by the extractor.
//! * [`clean_json_response`] runs on every model response before JSON
//!   parsing. Models wrap JSON in ```json fences or add a sentence before it
//!   despite the prompt; stripping that here means a cosmetic quirk does not
//!   burn one of the chunk's three attempts.
//!
//! Each rule is a pure `&str → String` function.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean the raw text of one page or slide.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines to a single blank line
/// 5. Trim leading and trailing blank lines
pub fn clean_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

/// Reduce a model response to the JSON object it contains.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (a leading BOM breaks `serde_json`)
/// 2. Strip outer code fences (```` ```json ```` / ```` ``` ````)
/// 3. Drop any prose before the first `{` and after the last `}`
pub fn clean_json_response(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = strip_code_fences(s.trim());
    slice_outer_object(&s).to_string()
}

// ── Line endings ─────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Invisible characters ─────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Trailing whitespace ──────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Blank lines ──────────────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Code fences ──────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input) {
        caps[1].trim().to_string()
    } else {
        input.to_string()
    }
}

// ── Outer object ─────────────────────────────────────────────────────────────

fn slice_outer_object(input: &str) -> &str {
    match (input.find('{'), input.rfind('}')) {
        (Some(start), Some(end)) if start < end => &input[start..=end],
        _ => input,
    }
}
