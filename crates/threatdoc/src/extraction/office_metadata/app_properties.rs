//! Application properties extraction from docProps/app.xml

use std::io::{Read, Seek};

use zip::ZipArchive;

use super::{parse_xml_int, parse_xml_text, read_part};
use crate::types::DocumentMetadata;
use crate::{Result, ThreatdocError};

/// Application properties shared by Word and Excel packages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppProperties {
    /// Application name (e.g., "Microsoft Office Word")
    pub application: Option<String>,
    pub app_version: Option<String>,
    pub company: Option<String>,
    pub template: Option<String>,
    /// Page count as last saved by Word
    pub pages: Option<i64>,
    pub words: Option<i64>,
    /// Sheet titles from `TitlesOfParts` (Excel)
    pub titles_of_parts: Vec<String>,
}

impl AppProperties {
    pub fn apply_to(self, metadata: &mut DocumentMetadata) {
        metadata.creator = self.application;
        if let Some(pages) = self.pages.and_then(|p| usize::try_from(p).ok()) {
            metadata.page_count = Some(pages);
        }

        let mut insert = |key: &str, value: serde_json::Value| {
            metadata.custom.insert(key.to_string(), value);
        };
        if let Some(version) = self.app_version {
            insert("app_version", version.into());
        }
        if let Some(company) = self.company {
            insert("company", company.into());
        }
        if let Some(template) = self.template {
            insert("template", template.into());
        }
        if let Some(words) = self.words {
            insert("word_count", words.into());
        }
        if !self.titles_of_parts.is_empty() {
            insert("titles_of_parts", self.titles_of_parts.into());
        }
    }
}

/// Parse `docProps/app.xml`; a package without it yields empty properties.
pub fn extract_app_properties<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<AppProperties> {
    let Some(xml) = read_part(archive, "docProps/app.xml")? else {
        return Ok(AppProperties::default());
    };

    let doc = roxmltree::Document::parse(&xml)
        .map_err(|e| ThreatdocError::parsing(format!("Failed to parse app.xml: {}", e)))?;
    let root = doc.root_element();

    let titles_of_parts = root
        .descendants()
        .find(|n| n.has_tag_name("TitlesOfParts"))
        .map(|titles| {
            titles
                .descendants()
                .filter(|n| n.has_tag_name("lpstr") || n.has_tag_name("lpwstr"))
                .filter_map(|n| n.text())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(AppProperties {
        application: parse_xml_text(root, "Application"),
        app_version: parse_xml_text(root, "AppVersion"),
        company: parse_xml_text(root, "Company"),
        template: parse_xml_text(root, "Template"),
        pages: parse_xml_int(root, "Pages"),
        words: parse_xml_int(root, "Words"),
        titles_of_parts,
    })
}
