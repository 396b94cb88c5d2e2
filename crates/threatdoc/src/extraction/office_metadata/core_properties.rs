//! Core properties extraction from docProps/core.xml

use std::io::{Read, Seek};

use zip::ZipArchive;

use super::{parse_xml_text, read_part};
use crate::types::DocumentMetadata;
use crate::{Result, ThreatdocError};

/// Dublin Core metadata from docProps/core.xml
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub last_modified_by: Option<String>,
    pub revision: Option<String>,
    /// Creation timestamp (W3CDTF)
    pub created: Option<String>,
    /// Last modification timestamp (W3CDTF)
    pub modified: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
}

impl CoreProperties {
    /// Copy the properties into `metadata`; extras land in `custom`.
    pub fn apply_to(self, metadata: &mut DocumentMetadata) {
        metadata.title = self.title;
        metadata.subject = self.subject;
        metadata.author = self.creator;
        metadata.keywords = self.keywords;
        metadata.created_at = self.created;
        metadata.modified_at = self.modified;

        let extras = [
            ("description", self.description),
            ("last_modified_by", self.last_modified_by),
            ("revision", self.revision),
            ("category", self.category),
            ("language", self.language),
        ];
        for (key, value) in extras {
            if let Some(value) = value {
                metadata.custom.insert(key.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

/// Parse `docProps/core.xml`; a package without it yields empty properties.
pub fn extract_core_properties<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<CoreProperties> {
    let Some(xml) = read_part(archive, "docProps/core.xml")? else {
        return Ok(CoreProperties::default());
    };

    let doc = roxmltree::Document::parse(&xml)
        .map_err(|e| ThreatdocError::parsing(format!("Failed to parse core.xml: {}", e)))?;
    let root = doc.root_element();

    Ok(CoreProperties {
        title: parse_xml_text(root, "title"),
        subject: parse_xml_text(root, "subject"),
        creator: parse_xml_text(root, "creator"),
        keywords: parse_xml_text(root, "keywords"),
        description: parse_xml_text(root, "description"),
        last_modified_by: parse_xml_text(root, "lastModifiedBy"),
        revision: parse_xml_text(root, "revision"),
        created: parse_xml_text(root, "created"),
        modified: parse_xml_text(root, "modified"),
        category: parse_xml_text(root, "category"),
        language: parse_xml_text(root, "language"),
    })
}
