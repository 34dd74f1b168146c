//! Synthesis orchestrator: run every chunk through the generator.
//!
//! Chunks are processed one after another. Each gets at most
//! [`MAX_ATTEMPTS_PER_CHUNK`] generation calls; an attempt fails on a
//! transport error, a timeout, an empty body, unparseable JSON or a schema
//! mismatch. A chunk that runs out of attempts is recorded and skipped,
//! and the run goes on. The run as a whole fails only when no chunk
//! yielded a single section.
//!
//! ## Pacing
//!
//! Two delays, both from [`StudyGuideConfig::delay_before`]:
//! `request_interval_ms` before the first call of every chunk after the
//! first, and `retry_backoff_ms * 2^(k-1)` before retry `k`. With the
//! defaults a failing chunk waits 2 s then 4 s.

use crate::config::{StudyGuideConfig, MAX_ATTEMPTS_PER_CHUNK};
use crate::error::{ChunkError, GenerationError, StudyGuideError};
use crate::generator::{GenerationResponse, StudyGuideGenerator};
use crate::model::{ChunkReport, RawSection, SectionsEnvelope};
use crate::pipeline::normalize::clean_json_response;
use crate::prompts::{chunk_prompt, response_schema};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Sections from every successful chunk, plus per-chunk accounting.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    /// In chunk order, then in the order the model listed them.
    pub sections: Vec<RawSection>,
    pub chunks_attempted: usize,
    pub chunks_failed: usize,
    pub reports: Vec<ChunkReport>,
}

/// Run every chunk through `generator`.
///
/// # Errors
/// * [`StudyGuideError::GenerationExhausted`] if no sections were produced
///   and at least one chunk failed.
/// * [`StudyGuideError::UnreadableDocument`] if no sections were produced
///   and no chunk failed.
pub async fn synthesize_chunks(
    generator: &dyn StudyGuideGenerator,
    chunks: &[String],
    config: &StudyGuideConfig,
) -> Result<SynthesisOutcome, StudyGuideError> {
    let total = chunks.len();
    let schema = response_schema();
    let progress = config.progress_callback.as_ref();

    info!("Synthesising {} chunks", total);
    if let Some(cb) = progress {
        cb.on_synthesis_start(total);
    }

    let mut sections = Vec::new();
    let mut reports = Vec::with_capacity(total);
    let mut chunks_failed = 0usize;

    for (idx, chunk) in chunks.iter().enumerate() {
        let chunk_num = idx + 1;
        if let Some(cb) = progress {
            cb.on_chunk_start(chunk_num, total);
        }

        let (report, chunk_sections) =
            process_chunk(generator, chunk, idx, total, &schema, config).await;

        match &report.error {
            None => {
                if let Some(cb) = progress {
                    cb.on_chunk_complete(chunk_num, total, report.section_count);
                }
                sections.extend(chunk_sections);
            }
            Some(err) => {
                chunks_failed += 1;
                warn!("{}", err);
                if let Some(cb) = progress {
                    cb.on_chunk_error(chunk_num, total, err.to_string());
                }
            }
        }
        reports.push(report);
    }

    if let Some(cb) = progress {
        cb.on_synthesis_complete(total, chunks_failed, sections.len());
    }

    if sections.is_empty() {
        if chunks_failed > 0 {
            let first_error = reports
                .iter()
                .find_map(|r| r.error.as_ref().map(ToString::to_string))
                .unwrap_or_default();
            return Err(StudyGuideError::GenerationExhausted {
                processed: total - chunks_failed,
                total,
                first_error,
            });
        }
        return Err(StudyGuideError::UnreadableDocument);
    }

    info!(
        "Synthesis done: {} sections from {}/{} chunks",
        sections.len(),
        total - chunks_failed,
        total
    );

    Ok(SynthesisOutcome {
        sections,
        chunks_attempted: total,
        chunks_failed,
        reports,
    })
}

/// Process one chunk with bounded retries.
///
/// Never returns an error: exhaustion is recorded in the report so the
/// caller can carry on with the next chunk.
async fn process_chunk(
    generator: &dyn StudyGuideGenerator,
    chunk: &str,
    chunk_index: usize,
    total: usize,
    schema: &Value,
    config: &StudyGuideConfig,
) -> (ChunkReport, Vec<RawSection>) {
    let chunk_num = chunk_index + 1;
    let start = Instant::now();
    let prompt = chunk_prompt(chunk, chunk_num, total);
    let timeout = Duration::from_secs(config.api_timeout_secs);

    let mut input_tokens = 0usize;
    let mut output_tokens = 0usize;
    let mut last_err: Option<GenerationError> = None;

    for attempt in 0..MAX_ATTEMPTS_PER_CHUNK {
        let delay = config.delay_before(chunk_index, attempt);
        if attempt > 0 {
            let detail = last_err.as_ref().map(ToString::to_string).unwrap_or_default();
            warn!(
                "Part {}: retry {}/{} after {}ms",
                chunk_num,
                attempt,
                MAX_ATTEMPTS_PER_CHUNK - 1,
                delay.as_millis()
            );
            if let Some(cb) = config.progress_callback.as_ref() {
                cb.on_chunk_retry(chunk_num, attempt + 1, detail);
            }
        }
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let result = match tokio::time::timeout(timeout, generator.complete(&prompt, schema)).await {
            Ok(r) => r,
            Err(_) => Err(GenerationError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        let outcome = result.and_then(|response| {
            input_tokens += response.input_tokens;
            output_tokens += response.output_tokens;
            parse_sections(&response)
        });

        match outcome {
            Ok(sections) => {
                debug!(
                    "Part {}: {} sections on attempt {} ({} in / {} out tokens)",
                    chunk_num,
                    sections.len(),
                    attempt + 1,
                    input_tokens,
                    output_tokens
                );
                let report = ChunkReport {
                    chunk_num,
                    attempts: attempt + 1,
                    section_count: sections.len(),
                    input_tokens,
                    output_tokens,
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: None,
                };
                return (report, sections);
            }
            Err(e) => {
                warn!("Part {}: attempt {} failed: {}", chunk_num, attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    let detail = last_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Unknown error".to_string());
    let report = ChunkReport {
        chunk_num,
        attempts: MAX_ATTEMPTS_PER_CHUNK,
        section_count: 0,
        input_tokens,
        output_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
        error: Some(ChunkError::Exhausted {
            chunk: chunk_num,
            attempts: MAX_ATTEMPTS_PER_CHUNK,
            detail,
        }),
    };
    (report, Vec::new())
}

/// Validate a response body and pull out its sections.
///
/// An empty `sections` array is a valid answer: the model found nothing
/// worth studying in this chunk.
pub fn parse_sections(response: &GenerationResponse) -> Result<Vec<RawSection>, GenerationError> {
    if response.text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let cleaned = clean_json_response(&response.text);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| GenerationError::Malformed(e.to_string()))?;

    match value.get("sections") {
        Some(Value::Array(_)) => {}
        Some(_) => {
            return Err(GenerationError::SchemaMismatch(
                "`sections` is not an array".to_string(),
            ))
        }
        None => {
            return Err(GenerationError::SchemaMismatch(
                "missing `sections` array".to_string(),
            ))
        }
    }

    let envelope: SectionsEnvelope =
        serde_json::from_value(value).map_err(|e| GenerationError::SchemaMismatch(e.to_string()))?;

    for section in &envelope.sections {
        if let Some(q) = section.questions.iter().find(|q| q.correct_index > 3) {
            return Err(GenerationError::SchemaMismatch(format!(
                "question '{}' has correctIndex {}",
                q.question, q.correct_index
            )));
        }
    }

    Ok(envelope.sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of results, then fails.
    struct Scripted {
        script: Mutex<VecDeque<Result<GenerationResponse, GenerationError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<&str, GenerationError>>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(GenerationResponse::from_text))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl StudyGuideGenerator for Scripted {
        async fn complete(
            &self,
            prompt: &str,
            _schema: &Value,
        ) -> Result<GenerationResponse, GenerationError> {
            self.calls.lock().unwrap().push(prompt.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Transport("script exhausted".into())))
        }
    }

    fn fast_config() -> StudyGuideConfig {
        StudyGuideConfig::builder()
            .request_interval_ms(0)
            .retry_backoff_ms(0)
            .build()
            .unwrap()
    }

    const ONE_SECTION: &str = r#"{"sections":[{"topic":"Slide 1: Cells","contentPoints":[{"english":"Cells are small","chinese":"细胞很小"}]}]}"#;

    #[test]
    fn parse_accepts_fenced_json() {
        let resp = GenerationResponse::from_text(format!("```json\n{ONE_SECTION}\n```"));
        let sections = parse_sections(&resp).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].topic, "Slide 1: Cells");
    }

    #[test]
    fn parse_accepts_empty_sections() {
        let resp = GenerationResponse::from_text(r#"{"sections": []}"#);
        assert!(parse_sections(&resp).unwrap().is_empty());
    }

    #[test]
    fn parse_treats_null_lists_as_empty() {
        let body = r#"{"sections":[{"topic":"Slide 1: Cells",
            "contentPoints":[{"english":"Cells are small","chinese":"细胞很小","keyTerm":null}],
            "visualSummary":null,"questions":null},
            {"topic":"Slide 2: Membranes","contentPoints":null}]}"#;
        let sections = tokio_test::assert_ok!(parse_sections(&GenerationResponse::from_text(body)));
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].content_points.len(), 1);
        assert!(sections[0].questions.is_empty());
        assert!(sections[0].visual_summary.is_none());
        assert!(sections[1].content_points.is_empty());
    }

    #[test]
    fn parse_rejects_bad_bodies() {
        let cases = [
            ("", GenerationError::EmptyResponse),
            ("   ", GenerationError::EmptyResponse),
        ];
        for (body, expected) in cases {
            assert_eq!(parse_sections(&GenerationResponse::from_text(body)), Err(expected));
        }
        assert!(matches!(
            parse_sections(&GenerationResponse::from_text("not json")),
            Err(GenerationError::Malformed(_))
        ));
        assert!(matches!(
            parse_sections(&GenerationResponse::from_text(r#"{"topics": []}"#)),
            Err(GenerationError::SchemaMismatch(_))
        ));
        assert!(matches!(
            parse_sections(&GenerationResponse::from_text(r#"{"sections": {}}"#)),
            Err(GenerationError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn parse_rejects_wrong_option_count() {
        let body = r#"{"sections":[{"topic":"Page 2","questions":[
            {"question":"Q?","options":["a","b","c"],"correctIndex":0,"explanation":"e"}]}]}"#;
        assert!(matches!(
            parse_sections(&GenerationResponse::from_text(body)),
            Err(GenerationError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn parse_rejects_out_of_range_answer() {
        let body = r#"{"sections":[{"topic":"Page 2","questions":[
            {"question":"Q?","options":["a","b","c","d"],"correctIndex":4,"explanation":"e"}]}]}"#;
        assert!(matches!(
            parse_sections(&GenerationResponse::from_text(body)),
            Err(GenerationError::SchemaMismatch(_))
        ));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let gen = Scripted::new(vec![
            Err(GenerationError::Transport("503".into())),
            Ok("garbage"),
            Ok(ONE_SECTION),
        ]);
        let out = synthesize_chunks(&gen, &["chunk".to_string()], &fast_config())
            .await
            .unwrap();
        assert_eq!(gen.call_count(), 3);
        assert_eq!(out.sections.len(), 1);
        assert_eq!(out.reports[0].attempts, 3);
        assert!(out.reports[0].succeeded());
    }

    #[tokio::test]
    async fn exhaustion_stops_at_three_calls() {
        let gen = Scripted::new(vec![
            Err(GenerationError::Transport("a".into())),
            Err(GenerationError::Transport("b".into())),
            Err(GenerationError::Transport("c".into())),
            Ok(ONE_SECTION),
        ]);
        let err = synthesize_chunks(&gen, &["only".to_string()], &fast_config())
            .await
            .unwrap_err();
        assert_eq!(gen.call_count(), 3);
        match err {
            StudyGuideError::GenerationExhausted {
                processed,
                total,
                first_error,
            } => {
                assert_eq!((processed, total), (0, 1));
                assert!(first_error.contains("after 3 attempts"));
                assert!(first_error.contains("transport error: c"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn prompts_carry_part_numbers() {
        let gen = Scripted::new(vec![Ok(ONE_SECTION), Ok(ONE_SECTION)]);
        let chunks = vec!["first".to_string(), "second".to_string()];
        synthesize_chunks(&gen, &chunks, &fast_config()).await.unwrap();
        let calls = gen.calls.lock().unwrap();
        assert!(calls[0].starts_with("Part 1/2"));
        assert!(calls[0].contains("first"));
        assert!(calls[1].starts_with("Part 2/2"));
    }

    #[tokio::test]
    async fn hung_call_times_out_and_retries() {
        struct Slow;

        #[async_trait]
        impl StudyGuideGenerator for Slow {
            async fn complete(
                &self,
                _prompt: &str,
                _schema: &Value,
            ) -> Result<GenerationResponse, GenerationError> {
                sleep(Duration::from_secs(3600)).await;
                Ok(GenerationResponse::from_text(ONE_SECTION))
            }
        }

        tokio::time::pause();
        let config = StudyGuideConfig::builder()
            .request_interval_ms(0)
            .retry_backoff_ms(0)
            .api_timeout_secs(1)
            .build()
            .unwrap();
        let err = synthesize_chunks(&Slow, &["x".to_string()], &config)
            .await
            .unwrap_err();
        match err {
            StudyGuideError::GenerationExhausted { first_error, .. } => {
                assert!(first_error.contains("timed out after 1s"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
