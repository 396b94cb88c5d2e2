//! XLSX spreadsheet extraction using `calamine`.
//!
//! Every worksheet is emitted in workbook order under a `--- Sheet: name ---`
//! marker. Shared strings are resolved by the reader; booleans render as
//! `TRUE`/`FALSE`; date-formatted numbers render as `yyyy-MM-dd`, falling back to
//! the raw serial number when the date cannot be resolved. Rows are
//! tab-separated, or `| a | b |` with `preserve_formatting`.
//!
//! # Example
//!
//! ```rust,no_run
//! use threatdoc::extraction::excel::extract_xlsx;
//! use threatdoc::{CancellationToken, ProcessingOptions};
//!
//! # fn example() -> threatdoc::Result<()> {
//! let bytes = std::fs::read("indicators.xlsx")?;
//! let extraction = extract_xlsx(&bytes, &ProcessingOptions::default(), &CancellationToken::new())?;
//! println!("{} sheets\n{}", extraction.page_count, extraction.text);
//! # Ok(())
//! # }
//! ```

use std::fmt::Write as FmtWrite;
use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use crate::core::config::ProcessingOptions;
use crate::extraction::office_metadata::read_package_metadata;
use crate::types::{DocumentMetadata, Extraction, ProcessingWarning};
use crate::{Result, ThreatdocError};

const CANCEL_CHECK_ROWS: usize = 256;

/// Marker line opening each worksheet.
pub fn sheet_marker(name: &str) -> String {
    format!("--- Sheet: {} ---", name)
}

/// Render one cell the way analysts expect to read it.
pub fn format_cell(data: &Data) -> String {
    let mut buffer = String::new();
    format_cell_into(&mut buffer, data);
    buffer
}

fn format_number_into(buffer: &mut String, value: f64) {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        let _ = write!(buffer, "{}", value as i64);
    } else {
        let _ = write!(buffer, "{}", value);
    }
}

fn format_cell_into(buffer: &mut String, data: &Data) {
    match data {
        Data::Empty => {}
        Data::String(s) => buffer.push_str(s),
        Data::Float(f) => format_number_into(buffer, *f),
        Data::Int(i) => {
            let _ = write!(buffer, "{}", i);
        }
        Data::Bool(b) => buffer.push_str(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => {
                let _ = write!(buffer, "{}", datetime.format("%Y-%m-%d"));
            }
            None => format_number_into(buffer, dt.as_f64()),
        },
        Data::DateTimeIso(s) => buffer.push_str(s.get(..10).unwrap_or(s)),
        Data::DurationIso(s) => buffer.push_str(s),
        Data::Error(e) => {
            let _ = write!(buffer, "#{:?}", e);
        }
    }
}

fn render_row(cells: &[Data], preserve_formatting: bool) -> Option<String> {
    let mut values: Vec<String> = cells.iter().map(format_cell).collect();
    while values.last().is_some_and(String::is_empty) {
        values.pop();
    }
    if values.is_empty() {
        return None;
    }
    Some(if preserve_formatting {
        format!("| {} |", values.join(" | "))
    } else {
        values.join("\t")
    })
}

fn render_sheet(
    name: &str,
    range: &Range<Data>,
    preserve_formatting: bool,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut lines = vec![sheet_marker(name)];
    for (index, row) in range.rows().enumerate() {
        if index % CANCEL_CHECK_ROWS == 0 && cancel.is_cancelled() {
            return Err(ThreatdocError::Cancelled);
        }
        if let Some(line) = render_row(row, preserve_formatting) {
            lines.push(line);
        }
    }
    Ok(lines.join("\n"))
}

fn workbook_metadata(bytes: &[u8], sheet_names: &[String]) -> (DocumentMetadata, Vec<ProcessingWarning>) {
    let (mut metadata, warnings) = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(mut archive) => read_package_metadata(&mut archive),
        Err(_) => Default::default(),
    };
    metadata
        .custom
        .insert("sheet_count".to_string(), serde_json::Value::from(sheet_names.len()));
    metadata
        .custom
        .insert("sheet_names".to_string(), serde_json::Value::from(sheet_names.to_vec()));
    (metadata, warnings)
}

/// Extract every worksheet of an XLSX workbook.
///
/// `page_count` is the number of worksheets.
pub fn extract_xlsx(bytes: &[u8], options: &ProcessingOptions, cancel: &CancellationToken) -> Result<Extraction> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| ThreatdocError::parsing(format!("Failed to parse XLSX: {}", e)))?;

    let sheet_names = workbook.sheet_names();
    let mut sheets = Vec::with_capacity(sheet_names.len());

    for name in &sheet_names {
        if cancel.is_cancelled() {
            return Err(ThreatdocError::Cancelled);
        }
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| ThreatdocError::parsing(format!("Failed to read sheet '{}': {}", name, e)))?;
        sheets.push(render_sheet(name, &range, options.preserve_formatting, cancel)?);
    }

    let (metadata, warnings) = if options.extract_metadata {
        workbook_metadata(bytes, &sheet_names)
    } else {
        Default::default()
    };

    tracing::debug!(sheets = sheet_names.len(), "Extracted XLSX");

    Ok(Extraction {
        text: sheets.join("\n\n"),
        page_count: sheet_names.len(),
        metadata,
        warnings,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cell_values() {
        assert_eq!(format_cell(&Data::Empty), "");
        assert_eq!(format_cell(&Data::String("evil.example".to_string())), "evil.example");
        assert_eq!(format_cell(&Data::Float(42.0)), "42");
        assert_eq!(format_cell(&Data::Float(3.5)), "3.5");
        assert_eq!(format_cell(&Data::Int(-7)), "-7");
        assert_eq!(format_cell(&Data::Bool(true)), "TRUE");
        assert_eq!(format_cell(&Data::Bool(false)), "FALSE");
        assert_eq!(format_cell(&Data::DateTimeIso("2024-03-01T10:00:00".to_string())), "2024-03-01");
    }

    #[test]
    fn test_render_row_modes() {
        let row = vec![
            Data::String("ip".to_string()),
            Data::String("10.0.0.1".to_string()),
            Data::Empty,
        ];
        assert_eq!(render_row(&row, false).as_deref(), Some("ip\t10.0.0.1"));
        assert_eq!(render_row(&row, true).as_deref(), Some("| ip | 10.0.0.1 |"));
        assert_eq!(render_row(&[Data::Empty, Data::Empty], false), None);
    }

    #[test]
    fn test_sheet_marker() {
        assert_eq!(sheet_marker("IOCs"), "--- Sheet: IOCs ---");
        assert!(crate::text::truncate::is_marker_line(&sheet_marker("IOCs")));
    }

    #[test]
    fn test_invalid_bytes_are_parsing_error() {
        let err = extract_xlsx(b"not a workbook", &ProcessingOptions::default(), &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ThreatdocError::Parsing { .. }));
    }
}
