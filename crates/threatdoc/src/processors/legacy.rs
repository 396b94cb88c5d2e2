//! Placeholders for the legacy OLE compound-file formats.
//!
//! `.doc` and `.xls` files are accepted after an OLE signature check but are not
//! parsed. The returned extraction carries an explanatory placeholder instead of
//! document text, no page count and no container metadata.

use std::path::Path;

use crate::Result;
use crate::core::io::{OLE_SIGNATURE, has_signature};
use crate::types::Extraction;

/// A legacy binary format served by a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyFormat {
    Doc,
    Xls,
}

impl LegacyFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Xls => "xls",
        }
    }

    fn product(self) -> &'static str {
        match self {
            Self::Doc => "Word 97-2003 document",
            Self::Xls => "Excel 97-2003 workbook",
        }
    }

    fn successor(self) -> &'static str {
        match self {
            Self::Doc => "docx",
            Self::Xls => "xlsx",
        }
    }

    /// Placeholder text stored as the document body.
    pub fn placeholder(self) -> String {
        format!(
            "[Legacy {} (.{}): text extraction is not supported for this format. \
             Convert the file to .{} to import its content.]",
            self.product(),
            self.extension(),
            self.successor()
        )
    }

    pub fn reason(self) -> String {
        format!("legacy .{} format is minimally supported", self.extension())
    }
}

/// Whether `path` starts with the OLE compound-file signature.
pub async fn is_ole_container(path: &Path) -> Result<bool> {
    has_signature(path, OLE_SIGNATURE).await
}

pub fn legacy_extraction(format: LegacyFormat, path: &Path) -> Extraction {
    tracing::debug!(file = %path.display(), format = format.extension(), "Returning legacy format placeholder");
    Extraction::degraded(format.placeholder(), format.reason())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_placeholder_is_degraded() {
        let extraction = legacy_extraction(LegacyFormat::Doc, Path::new("brief.doc"));
        assert!(extraction.fidelity.is_degraded());
        assert!(extraction.text.contains(".doc"));
        assert!(extraction.text.contains(".docx"));
        assert_eq!(extraction.page_count, 0);
        assert!(extraction.metadata.is_empty());
    }

    #[test]
    fn test_xls_reason() {
        assert_eq!(LegacyFormat::Xls.reason(), "legacy .xls format is minimally supported");
    }

    #[tokio::test]
    async fn test_ole_signature() {
        let mut ole = tempfile::NamedTempFile::new().unwrap();
        ole.write_all(OLE_SIGNATURE).unwrap();
        ole.write_all(&[0u8; 32]).unwrap();
        assert!(is_ole_container(ole.path()).await.unwrap());

        let mut zip = tempfile::NamedTempFile::new().unwrap();
        zip.write_all(b"PK\x03\x04 not ole").unwrap();
        assert!(!is_ole_container(zip.path()).await.unwrap());
    }
}
