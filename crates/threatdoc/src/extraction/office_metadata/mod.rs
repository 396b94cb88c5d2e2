//! Office Open XML metadata extraction
//!
//! DOCX and XLSX packages keep descriptive metadata in three optional parts:
//! - `docProps/core.xml` - Dublin Core metadata (title, creator, dates, keywords)
//! - `docProps/app.xml` - Application properties (application, company, page count)
//! - `docProps/custom.xml` - User-defined properties
//!
//! [`read_package_metadata`] reads all three into a [`DocumentMetadata`]. A
//! malformed part is reported as a warning and the remaining parts are still
//! read.

pub mod app_properties;
pub mod core_properties;
pub mod custom_properties;

pub use app_properties::{AppProperties, extract_app_properties};
pub use core_properties::{CoreProperties, extract_core_properties};
pub use custom_properties::{CustomProperties, extract_custom_properties};

use std::io::{Read, Seek};

use roxmltree::Node;
use zip::ZipArchive;

use crate::types::{DocumentMetadata, ProcessingWarning, WarningCode};
use crate::{Result, ThreatdocError};

/// Read a package part as UTF-8, `None` when the part is absent.
pub(crate) fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ThreatdocError::parsing(format!("Failed to open {}: {}", name, e))),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| ThreatdocError::parsing_with_source(format!("Failed to read {}", name), e))?;
    Ok(Some(content))
}

/// Text of the first descendant named `name`, trimmed, `None` when empty.
pub(crate) fn parse_xml_text(node: Node, name: &str) -> Option<String> {
    node.descendants()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

pub(crate) fn parse_xml_int(node: Node, name: &str) -> Option<i64> {
    parse_xml_text(node, name).and_then(|s| s.parse().ok())
}

/// Read core, app and custom properties into one metadata record.
pub fn read_package_metadata<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> (DocumentMetadata, Vec<ProcessingWarning>) {
    let mut metadata = DocumentMetadata::default();
    let mut warnings = Vec::new();

    let mut downgrade = |part: &str, err: ThreatdocError| {
        tracing::warn!(part, "Office metadata unavailable: {}", err);
        warnings.push(
            ProcessingWarning::new(WarningCode::MetadataUnavailable, format!("Could not read {}", part))
                .with_cause(&err),
        );
    };

    match extract_core_properties(archive) {
        Ok(core) => core.apply_to(&mut metadata),
        Err(err) => downgrade("docProps/core.xml", err),
    }
    match extract_app_properties(archive) {
        Ok(app) => app.apply_to(&mut metadata),
        Err(err) => downgrade("docProps/app.xml", err),
    }
    match extract_custom_properties(archive) {
        Ok(custom) => metadata.custom.extend(custom),
        Err(err) => downgrade("docProps/custom.xml", err),
    }

    (metadata, warnings)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Write};
    use zip::ZipArchive;

    /// Build an in-memory package from `(part name, content)` pairs.
    pub(crate) fn package(parts: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::<()>::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in parts {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        ZipArchive::new(zip.finish().unwrap()).unwrap()
    }
}
