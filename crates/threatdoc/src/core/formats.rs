//! Extension to MIME type mapping for the built-in formats.
//!
//! Plugin-provided extensions have no entry here; their documents carry no MIME
//! type unless the plugin sets one in its metadata.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use threatdoc::core::formats::mime_type_for;
//!
//! assert_eq!(mime_type_for(Path::new("brief.PDF")), Some("application/pdf"));
//! assert_eq!(mime_type_for(Path::new("notes.txt")), None);
//! ```

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const DOCX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const DOC_MIME_TYPE: &str = "application/msword";
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MIME_TYPE: &str = "application/vnd.ms-excel";

static EXTENSION_MIME_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("pdf", PDF_MIME_TYPE),
        ("docx", DOCX_MIME_TYPE),
        ("doc", DOC_MIME_TYPE),
        ("xlsx", XLSX_MIME_TYPE),
        ("xls", XLS_MIME_TYPE),
    ])
});

/// MIME type for a known extension (case-insensitive, leading dot optional).
pub fn mime_type_for_extension(extension: &str) -> Option<&'static str> {
    let normalized = extension.trim_start_matches('.').to_ascii_lowercase();
    EXTENSION_MIME_TYPES.get(normalized.as_str()).copied()
}

/// MIME type for the extension of `path`.
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(mime_type_for_extension)
}
