//! Image reconciliation: attach page images to the sections that cite them.
//!
//! The model labels each topic with the page it came from ("Slide 4:
//! Osmosis"). The first `slide N` / `page N` in the topic selects the
//! images extracted from that page. There is no fuzzy matching: a topic
//! without a reference, or citing a page with no images, gets none.

use crate::model::{ImageIndex, RawSection, StudyDocument, StudySection};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_PAGE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:slide|page)\s*(\d+)").unwrap());

/// Page number cited by a topic: the first `slide N` or `page N`, any case.
///
/// Returns `None` when there is no reference or the number does not fit
/// in a `u32`.
pub fn page_reference(topic: &str) -> Option<u32> {
    RE_PAGE_REF
        .captures(topic)
        .and_then(|caps| caps[1].parse().ok())
}

/// Build the final document, preserving section order.
pub fn reconcile(sections: Vec<RawSection>, images: &ImageIndex) -> StudyDocument {
    let mut attached = 0usize;
    let study_sections = sections
        .into_iter()
        .map(|raw| {
            let section_images = page_reference(&raw.topic)
                .map(|page| images.get(page).to_vec())
                .unwrap_or_default();
            attached += section_images.len();
            StudySection::from_raw(raw, section_images)
        })
        .collect::<Vec<_>>();

    debug!(
        "Reconciled {} sections, {} image attachments",
        study_sections.len(),
        attached
    );
    StudyDocument::new(study_sections)
}
