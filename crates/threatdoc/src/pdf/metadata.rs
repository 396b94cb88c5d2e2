//! Document information dictionary.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use lopdf::{Dictionary, Document, Object};

use super::error::{PdfError, Result};
use super::text::decode_pdf_string;
use crate::types::DocumentMetadata;

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object> {
    match object {
        Object::Reference(id) => document
            .get_object(*id)
            .map_err(|e| PdfError::MetadataExtractionFailed(format!("Dangling reference {:?}: {}", id, e))),
        other => Ok(other),
    }
}

fn info_dictionary(document: &Document) -> Result<Option<&Dictionary>> {
    let Ok(info) = document.trailer.get(b"Info") else {
        return Ok(None);
    };
    match resolve(document, info)? {
        Object::Dictionary(dict) => Ok(Some(dict)),
        _ => Err(PdfError::MetadataExtractionFailed(
            "Info entry is not a dictionary".to_string(),
        )),
    }
}

fn text_entry(document: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    let object = info.get(key).ok()?;
    match resolve(document, object).ok()? {
        Object::String(bytes, _) => {
            let value = decode_pdf_string(bytes);
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Read the Info dictionary into [`DocumentMetadata`].
///
/// A document without an Info dictionary yields empty metadata; a malformed one
/// is an error the caller downgrades to a warning.
pub fn extract_metadata(document: &Document) -> Result<DocumentMetadata> {
    let mut metadata = DocumentMetadata {
        page_count: Some(document.get_pages().len()),
        ..Default::default()
    };
    metadata
        .custom
        .insert("pdf_version".to_string(), serde_json::Value::String(document.version.clone()));

    let Some(info) = info_dictionary(document)? else {
        return Ok(metadata);
    };

    metadata.title = text_entry(document, info, b"Title");
    metadata.author = text_entry(document, info, b"Author");
    metadata.subject = text_entry(document, info, b"Subject");
    metadata.keywords = text_entry(document, info, b"Keywords");
    metadata.creator = text_entry(document, info, b"Creator");
    metadata.producer = text_entry(document, info, b"Producer");
    metadata.created_at = text_entry(document, info, b"CreationDate").map(|raw| parse_pdf_date(&raw).unwrap_or(raw));
    metadata.modified_at = text_entry(document, info, b"ModDate").map(|raw| parse_pdf_date(&raw).unwrap_or(raw));

    if let Some(trapped) = text_entry(document, info, b"Trapped") {
        metadata.custom.insert("trapped".to_string(), serde_json::Value::String(trapped));
    }

    Ok(metadata)
}

/// Parse a PDF date (`D:YYYYMMDDHHmmSSOHH'mm'`) into RFC 3339.
///
/// Missing trailing components default to the start of the period; a missing
/// offset is treated as UTC.
pub fn parse_pdf_date(raw: &str) -> Option<String> {
    let cleaned = raw.trim();
    let cleaned = cleaned.strip_prefix("D:").unwrap_or(cleaned);

    let digits_end = cleaned.find(|c: char| !c.is_ascii_digit()).unwrap_or(cleaned.len());
    let (digits, zone) = cleaned.split_at(digits_end);
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let month = field(4, 2, 1)?;
    let day = field(6, 2, 1)?;
    let hour = field(8, 2, 0)?;
    let minute = field(10, 2, 0)?;
    let second = field(12, 2, 0)?;

    let naive: NaiveDateTime = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset = parse_offset(zone)?;
    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.to_rfc3339())
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let zone = zone.trim();
    let mut chars = zone.chars();
    let sign = match chars.next() {
        None | Some('Z') | Some('z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return None,
    };

    let rest: String = chars.filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = rest.get(0..2).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minutes: i32 = rest.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
