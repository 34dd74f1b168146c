//! Shared fixtures for integration tests: a scripted generator and an
//! in-memory PPTX builder.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_studyguide::{GenerationError, GenerationResponse, StudyGuideGenerator};
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use std::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// ── Fake generator ───────────────────────────────────────────────────────────

type Handler = Box<dyn Fn(usize, &str) -> Result<String, GenerationError> + Send + Sync>;

/// Generator driven by a closure of `(part_number, prompt)`.
///
/// Records every prompt it receives.
pub struct FakeGenerator {
    handler: Handler,
    calls: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(
        handler: impl Fn(usize, &str) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same body.
    pub fn fixed(body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(move |_, _| Ok(body.clone()))
    }

    /// Always fails with a transport error.
    pub fn failing() -> Self {
        Self::new(|part, _| Err(GenerationError::Transport(format!("connection reset (part {part})"))))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StudyGuideGenerator for FakeGenerator {
    async fn complete(
        &self,
        prompt: &str,
        _schema: &Value,
    ) -> Result<GenerationResponse, GenerationError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        let part = part_number(prompt);
        (self.handler)(part, prompt).map(|text| GenerationResponse {
            text,
            input_tokens: 100,
            output_tokens: 50,
        })
    }
}

/// `i` from a prompt starting with `Part i/N`.
pub fn part_number(prompt: &str) -> usize {
    prompt
        .strip_prefix("Part ")
        .and_then(|rest| rest.split('/').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// A valid response body with one bare section per topic.
pub fn sections_json(topics: &[&str]) -> String {
    let sections: Vec<Value> = topics
        .iter()
        .map(|t| {
            json!({
                "topic": t,
                "contentPoints": [
                    { "english": format!("About {t}"), "chinese": "关于", "keyTerm": "term" }
                ],
                "questions": [{
                    "question": format!("What is {t}?"),
                    "options": ["a", "b", "c", "d"],
                    "correctIndex": 1,
                    "explanation": "because"
                }]
            })
        })
        .collect();
    json!({ "sections": sections }).to_string()
}

/// Annotated text of `n` slides, each exactly 33 chars: marker line,
/// 16-char body line, blank line. With `max_chunk_chars = 40` every slide
/// becomes its own chunk.
pub fn slide_text(n: usize) -> String {
    assert!(n < 10, "body line length assumes single-digit slide numbers");
    (1..=n)
        .map(|i| format!("--- Slide {i} ---\nbody of slide {i}\n\n"))
        .collect()
}

// ── PPTX builder ─────────────────────────────────────────────────────────────

pub struct TestSlide {
    pub paragraphs: Vec<String>,
    pub image: Option<Vec<u8>>,
}

impl TestSlide {
    pub fn text(paragraphs: &[&str]) -> Self {
        Self {
            paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
            image: None,
        }
    }

    pub fn with_image(mut self, png: Vec<u8>) -> Self {
        self.image = Some(png);
        self
    }
}

/// PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([30, 120, 200, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Build a minimal PPTX package.
///
/// `order` lists slide file numbers (1-based) in presentation order; pass
/// `None` for file order.
pub fn build_pptx(slides: &[TestSlide], order: Option<&[usize]>) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    let default_order: Vec<usize> = (1..=slides.len()).collect();
    let order = order.unwrap_or(&default_order);

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="png" ContentType="image/png"/>
  <Default Extension="xml" ContentType="application/xml"/>
</Types>"#,
    )
    .unwrap();

    let mut sld_ids = String::new();
    let mut pres_rels = String::new();
    for (pos, file_num) in order.iter().enumerate() {
        sld_ids.push_str(&format!(
            r#"<p:sldId id="{}" r:id="rId{}"/>"#,
            256 + pos,
            100 + file_num
        ));
    }
    for file_num in 1..=slides.len() {
        pres_rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
            100 + file_num,
            file_num
        ));
    }

    zip.start_file("ppt/presentation.xml", options).unwrap();
    zip.write_all(
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldIdLst>{sld_ids}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/></p:presentation>"#
        )
        .as_bytes(),
    )
    .unwrap();

    zip.start_file("ppt/_rels/presentation.xml.rels", options).unwrap();
    zip.write_all(
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{pres_rels}</Relationships>"#
        )
        .as_bytes(),
    )
    .unwrap();

    for (idx, slide) in slides.iter().enumerate() {
        let n = idx + 1;
        let paragraphs: String = slide
            .paragraphs
            .iter()
            .map(|p| format!("<a:p><a:r><a:rPr lang=\"en-US\"/><a:t>{}</a:t></a:r></a:p>", xml_escape(p)))
            .collect();
        let pic = if slide.image.is_some() {
            r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture 3"/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/></p:blipFill></p:pic>"#
        } else {
            ""
        };

        zip.start_file(format!("ppt/slides/slide{n}.xml"), options).unwrap();
        zip.write_all(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/>{paragraphs}</p:txBody></p:sp>{pic}</p:spTree></p:cSld></p:sld>"#
            )
            .as_bytes(),
        )
        .unwrap();

        let mut rels = String::from(
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#,
        );
        if let Some(ref bytes) = slide.image {
            rels.push_str(&format!(
                r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image{n}.png"/>"#
            ));
            zip.start_file(format!("ppt/media/image{n}.png"), options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.start_file(format!("ppt/slides/_rels/slide{n}.xml.rels"), options)
            .unwrap();
        zip.write_all(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
            )
            .as_bytes(),
        )
        .unwrap();
    }

    zip.finish().unwrap().into_inner()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
