//! DOCX (Microsoft Word) text extraction.
//!
//! Walks `word/document.xml` with `roxmltree`, emitting paragraphs and tables in
//! body order. Header and footer parts follow the body under `--- Header N ---`
//! and `--- Footer N ---` markers.
//!
//! With `preserve_formatting`, bold and italic runs are wrapped in `**`/`*` and
//! table rows are rendered as `| a | b |`; otherwise cells are tab-separated.
//!
//! Page count comes from `docProps/app.xml` when present. Without it, explicit
//! page breaks (`<w:br w:type="page"/>`) are counted, which does not account for
//! automatic pagination.

use std::io::{Cursor, Read, Seek};

use roxmltree::Node;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use crate::core::config::ProcessingOptions;
use crate::extraction::office_metadata::{read_package_metadata, read_part};
use crate::types::Extraction;
use crate::{Result, ThreatdocError};

const CANCEL_CHECK_INTERVAL: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct RunStyle {
    bold: bool,
    italic: bool,
}

/// Local-name attribute lookup; WordprocessingML attributes are namespaced.
fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes().find(|a| a.name() == name).map(|a| a.value())
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(name))
}

/// A toggle property such as `<w:b/>` or `<w:b w:val="0"/>`.
fn toggle_on(properties: Option<Node>, name: &str) -> bool {
    properties
        .and_then(|props| child(props, name))
        .is_some_and(|toggle| !matches!(attr(toggle, "val"), Some("0" | "false" | "off")))
}

fn run_style(run: Node) -> RunStyle {
    let properties = child(run, "rPr");
    RunStyle {
        bold: toggle_on(properties, "b"),
        italic: toggle_on(properties, "i"),
    }
}

fn run_text(run: Node) -> String {
    let mut text = String::new();
    for node in run.children().filter(Node::is_element) {
        match node.tag_name().name() {
            "t" | "delText" => text.push_str(node.text().unwrap_or_default()),
            "tab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            "noBreakHyphen" => text.push('-'),
            _ => {}
        }
    }
    text
}

fn wrap(text: &str, style: RunStyle) -> String {
    let marker = match (style.bold, style.italic) {
        (true, true) => "***",
        (true, false) => "**",
        (false, true) => "*",
        (false, false) => return text.to_string(),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return text.to_string();
    }
    let leading = &text[..text.len() - text.trim_start().len()];
    let trailing = &text[text.trim_end().len()..];
    format!("{}{}{}{}{}", leading, marker, trimmed, marker, trailing)
}

fn paragraph_text(paragraph: Node, preserve_formatting: bool) -> String {
    let mut segments: Vec<(RunStyle, String)> = Vec::new();

    for run in paragraph.descendants().filter(|n| n.has_tag_name("r")) {
        let text = run_text(run);
        if text.is_empty() {
            continue;
        }
        let style = if preserve_formatting {
            run_style(run)
        } else {
            RunStyle::default()
        };
        match segments.last_mut() {
            Some((last_style, last_text)) if *last_style == style => last_text.push_str(&text),
            _ => segments.push((style, text)),
        }
    }

    segments.iter().map(|(style, text)| wrap(text, *style)).collect()
}

fn table_rows(table: Node, preserve_formatting: bool) -> Vec<String> {
    table
        .children()
        .filter(|n| n.has_tag_name("tr"))
        .map(|row| {
            let cells: Vec<String> = row
                .children()
                .filter(|n| n.has_tag_name("tc"))
                .map(|cell| {
                    cell.descendants()
                        .filter(|n| n.has_tag_name("p"))
                        .map(|p| paragraph_text(p, preserve_formatting))
                        .filter(|t| !t.trim().is_empty())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            if preserve_formatting {
                format!("| {} |", cells.join(" | "))
            } else {
                cells.join("\t")
            }
        })
        .collect()
}

fn count_page_breaks(root: Node) -> usize {
    root.descendants()
        .filter(|n| n.has_tag_name("br") && attr(*n, "type") == Some("page"))
        .count()
}

/// Body blocks in order; `sdt` content controls are unwrapped.
fn collect_blocks<'a, 'i>(container: Node<'a, 'i>, blocks: &mut Vec<Node<'a, 'i>>) {
    for node in container.children().filter(Node::is_element) {
        match node.tag_name().name() {
            "p" | "tbl" => blocks.push(node),
            "sdt" => {
                if let Some(content) = child(node, "sdtContent") {
                    collect_blocks(content, blocks);
                }
            }
            _ => {}
        }
    }
}

fn render_blocks(container: Node, preserve_formatting: bool, cancel: &CancellationToken) -> Result<Vec<String>> {
    let mut blocks = Vec::new();
    collect_blocks(container, &mut blocks);

    let mut lines = Vec::new();
    for (index, block) in blocks.into_iter().enumerate() {
        if index % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(ThreatdocError::Cancelled);
        }
        if block.has_tag_name("tbl") {
            lines.extend(table_rows(block, preserve_formatting));
        } else {
            let text = paragraph_text(block, preserve_formatting);
            if !text.trim().is_empty() {
                lines.push(text);
            }
        }
    }
    Ok(lines)
}

fn parse_xml<'i>(xml: &'i str, part: &str) -> Result<roxmltree::Document<'i>> {
    roxmltree::Document::parse(xml).map_err(|e| ThreatdocError::parsing(format!("Failed to parse {}: {}", part, e)))
}

/// Header and footer part names in numeric order.
fn section_parts<R: Read + Seek>(archive: &ZipArchive<R>, kind: &str) -> Vec<(u32, String)> {
    let prefix = format!("word/{}", kind);
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name.strip_prefix(&prefix)?.strip_suffix(".xml")?;
            let number = if number.is_empty() { 1 } else { number.parse().ok()? };
            Some((number, name.to_string()))
        })
        .collect();
    parts.sort();
    parts
}

fn section_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    kind: &str,
    label: &str,
    preserve_formatting: bool,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let mut sections = Vec::new();
    for (number, part) in section_parts(archive, kind) {
        let Some(xml) = read_part(archive, &part)? else {
            continue;
        };
        let doc = parse_xml(&xml, &part)?;
        let lines = render_blocks(doc.root_element(), preserve_formatting, cancel)?;
        if !lines.is_empty() {
            sections.push(format!("--- {} {} ---\n{}", label, number, lines.join("\n")));
        }
    }
    Ok(sections)
}

/// Extract text, page count and metadata from DOCX bytes.
pub fn extract_docx(bytes: &[u8], options: &ProcessingOptions, cancel: &CancellationToken) -> Result<Extraction> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ThreatdocError::parsing_with_source("Failed to open DOCX package", e))?;

    let xml = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| ThreatdocError::parsing("DOCX package has no word/document.xml"))?;
    let doc = parse_xml(&xml, "word/document.xml")?;
    let root = doc.root_element();
    let body = child(root, "body").unwrap_or(root);

    let preserve = options.preserve_formatting;
    let mut sections = vec![render_blocks(body, preserve, cancel)?.join("\n")];
    sections.extend(section_text(&mut archive, "header", "Header", preserve, cancel)?);
    sections.extend(section_text(&mut archive, "footer", "Footer", preserve, cancel)?);
    let text = sections
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let (metadata, warnings) = if options.extract_metadata {
        read_package_metadata(&mut archive)
    } else {
        Default::default()
    };

    let page_count = metadata.page_count.unwrap_or_else(|| count_page_breaks(root) + 1);
    tracing::debug!(page_count, chars = text.len(), "Extracted DOCX");

    Ok(Extraction {
        text,
        page_count,
        metadata,
        warnings,
        ..Default::default()
    })
}
