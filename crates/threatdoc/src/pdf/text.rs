//! Content-stream text extraction.
//!
//! Text-show operators (`Tj`, `TJ`, `'`, `"`) are collected in stream order.
//! Line breaks come from `T*`, `'`, `"`, vertical `Td`/`TD` moves, and `ET`.
//! Inside `TJ` arrays a kerning offset below -200 thousandths of an em is read
//! as a word gap.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use tokio_util::sync::CancellationToken;

use super::error::{PdfError, Result};

const WORD_GAP_THRESHOLD: f32 = -200.0;

/// Text of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Decode a PDF text string: UTF-16BE when BOM-prefixed, Latin-1 otherwise.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

#[derive(Default)]
struct LineBuilder {
    lines: Vec<String>,
    current: String,
}

impl LineBuilder {
    fn push_text(&mut self, text: &str) {
        self.current.push_str(text);
    }

    fn push_space(&mut self) {
        if !self.current.is_empty() && !self.current.ends_with(' ') {
            self.current.push(' ');
        }
    }

    fn break_line(&mut self) {
        let line = self.current.trim_end().to_string();
        self.current.clear();
        if !line.trim().is_empty() {
            self.lines.push(line);
        }
    }

    fn finish(mut self) -> String {
        self.break_line();
        self.lines.join("\n")
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn show_string(builder: &mut LineBuilder, object: Option<&Object>) {
    if let Some(Object::String(bytes, _)) = object {
        builder.push_text(&decode_pdf_string(bytes));
    }
}

fn apply(builder: &mut LineBuilder, operation: &Operation) {
    let operands = &operation.operands;
    match operation.operator.as_str() {
        "Tj" => show_string(builder, operands.first()),
        "TJ" => {
            if let Some(Object::Array(items)) = operands.first() {
                for item in items {
                    match item {
                        Object::String(bytes, _) => builder.push_text(&decode_pdf_string(bytes)),
                        other => {
                            if number(other).is_some_and(|offset| offset < WORD_GAP_THRESHOLD) {
                                builder.push_space();
                            }
                        }
                    }
                }
            }
        }
        "'" => {
            builder.break_line();
            show_string(builder, operands.first());
        }
        "\"" => {
            builder.break_line();
            show_string(builder, operands.get(2));
        }
        "T*" | "ET" => builder.break_line(),
        "Td" | "TD" => {
            let dy = operands.get(1).and_then(number).unwrap_or(0.0);
            if dy.abs() > f32::EPSILON {
                builder.break_line();
            } else {
                builder.push_space();
            }
        }
        _ => {}
    }
}

/// Extract the text of a decoded content stream.
pub fn text_from_content(content: &[u8]) -> Result<String> {
    let content = Content::decode(content).map_err(|e| PdfError::TextExtractionFailed(e.to_string()))?;
    let mut builder = LineBuilder::default();
    for operation in &content.operations {
        apply(&mut builder, operation);
    }
    Ok(builder.finish())
}

fn page_text(document: &Document, page_id: ObjectId) -> Result<String> {
    let content = document
        .get_page_content(page_id)
        .map_err(|e| PdfError::TextExtractionFailed(format!("Page {:?}: {}", page_id, e)))?;
    text_from_content(&content)
}

/// Extract every page in order, checking `cancel` between pages.
pub fn extract_pages(document: &Document, cancel: &CancellationToken) -> Result<Vec<PageText>> {
    let pages = document.get_pages();
    let mut result = Vec::with_capacity(pages.len());

    for (number, page_id) in pages {
        if cancel.is_cancelled() {
            return Err(PdfError::Cancelled);
        }
        let text = page_text(document, page_id)?;
        tracing::trace!(page = number, chars = text.len(), "Extracted PDF page");
        result.push(PageText { number, text });
    }

    Ok(result)
}

/// Marker line opening each page.
pub fn page_marker(number: u32) -> String {
    format!("--- Page {} ---", number)
}

/// Join pages under their markers.
pub fn assemble(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| {
            if page.text.is_empty() {
                page_marker(page.number)
            } else {
                format!("{}\n{}", page_marker(page.number), page.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// True when no page carries any non-whitespace text.
pub fn is_blank(pages: &[PageText]) -> bool {
    pages.iter().all(|page| page.text.trim().is_empty())
}
