//! Prompts and the response schema for study-guide generation.
//!
//! Everything the model is told lives here so prompt changes never touch
//! retry or parsing logic, and so tests can inspect the prompts directly.
//! Callers can replace the system prompt via
//! [`crate::config::StudyGuideConfig::system_prompt`].

use serde_json::{json, Value};

/// Default system prompt for turning one chunk of lecture text into sections.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert university tutor. You receive one part of the extracted text of a lecture slide deck or PDF and turn it into a bilingual study guide.

The text contains page markers such as "--- Slide 3 ---" or "--- Page 3 ---".

Follow these rules precisely:

1. SECTIONS
   - Create one section per distinct topic, in the order topics appear
   - Start every topic with the marker of the page it comes from, e.g. "Slide 3: Cell Membranes" or "Page 12: Thermodynamics"
   - Never merge topics from different pages into one section

2. CONTENT POINTS
   - Write concise study notes as content points
   - Every point has an "english" text and a faithful Simplified Chinese translation in "chinese"
   - Put the single most important technical term of the point in "keyTerm" when there is one

3. VISUAL SUMMARY
   - If the page describes a diagram, chart or figure, summarise what it shows in "visualSummary"

4. QUESTIONS
   - Add up to 3 multiple-choice exam questions per section
   - Each question has exactly 4 options, "correctIndex" is the 0-based index of the right option
   - Explain why the answer is right in "explanation"

5. OUTPUT FORMAT
   - Respond with a single JSON object matching the provided schema
   - Do NOT wrap the JSON in ```json fences
   - Do NOT add commentary before or after the JSON
   - If the text contains nothing worth studying, return {"sections": []}"#;

/// JSON schema the response must satisfy.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "topic": { "type": "string" },
                        "contentPoints": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "english": { "type": "string" },
                                    "chinese": { "type": "string" },
                                    "keyTerm": { "type": "string" }
                                },
                                "required": ["english", "chinese"]
                            }
                        },
                        "visualSummary": { "type": "string" },
                        "questions": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "question": { "type": "string" },
                                    "options": {
                                        "type": "array",
                                        "items": { "type": "string" },
                                        "minItems": 4,
                                        "maxItems": 4
                                    },
                                    "correctIndex": { "type": "integer", "minimum": 0, "maximum": 3 },
                                    "explanation": { "type": "string" }
                                },
                                "required": ["question", "options", "correctIndex", "explanation"]
                            }
                        }
                    },
                    "required": ["topic", "contentPoints"]
                }
            }
        },
        "required": ["sections"]
    })
}

/// User message for one chunk, labelled with its position in the run.
pub fn chunk_prompt(chunk: &str, chunk_num: usize, total_chunks: usize) -> String {
    format!(
        "Part {}/{} of the document:\n\n\"\"\"\n{}\n\"\"\"",
        chunk_num, total_chunks, chunk
    )
}

/// Append the schema to a system prompt for providers without native
/// structured-output support.
pub fn system_prompt_with_schema(system_prompt: &str, schema: &Value) -> String {
    format!(
        "{}\n\nJSON schema of the response:\n{}",
        system_prompt,
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
    )
}
