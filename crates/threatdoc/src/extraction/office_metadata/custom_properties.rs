//! Custom properties extraction from docProps/custom.xml
//!
//! Threat-intel templates commonly carry classification fields here
//! (e.g. a `Classification` property holding `TLP:AMBER`).

use std::collections::HashMap;
use std::io::{Read, Seek};

use roxmltree::Node;
use serde_json::Value;
use zip::ZipArchive;

use super::read_part;
use crate::{Result, ThreatdocError};

/// Property name to JSON value, typed by the variant element.
pub type CustomProperties = HashMap<String, Value>;

/// Parse `docProps/custom.xml`; a package without it yields no properties.
///
/// Supported variant types: `lpwstr`/`lpstr`/`bstr` (string), `i1`-`i8`,
/// `ui1`-`ui8`, `int` (integer), `r4`/`r8`/`decimal` (float), `bool`, and
/// `filetime`/`date` (kept as the original string).
pub fn extract_custom_properties<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<CustomProperties> {
    let Some(xml) = read_part(archive, "docProps/custom.xml")? else {
        return Ok(HashMap::new());
    };

    let doc = roxmltree::Document::parse(&xml)
        .map_err(|e| ThreatdocError::parsing(format!("Failed to parse custom.xml: {}", e)))?;

    Ok(doc
        .root_element()
        .descendants()
        .filter(|n| n.has_tag_name("property"))
        .filter_map(|property| {
            let name = property.attribute("name")?;
            variant_value(property).map(|value| (name.to_string(), value))
        })
        .collect())
}

fn variant_value(property: Node) -> Option<Value> {
    property.children().filter(Node::is_element).find_map(|child| {
        let text = child.text().map(str::trim).unwrap_or_default();
        match child.tag_name().name() {
            "lpwstr" | "lpstr" | "bstr" | "filetime" | "date" => Some(Value::String(text.to_string())),
            "i1" | "i2" | "i4" | "i8" | "int" | "ui1" | "ui2" | "ui4" | "ui8" | "uint" => {
                text.parse::<i64>().ok().map(Value::from)
            }
            "r4" | "r8" | "decimal" => text.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number),
            "bool" => match text.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::office_metadata::test_support::package;

    #[test]
    fn test_typed_custom_properties() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/custom-properties"
            xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">
    <property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="2" name="Classification">
        <vt:lpwstr>TLP:AMBER</vt:lpwstr>
    </property>
    <property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="3" name="IndicatorCount">
        <vt:i4>87</vt:i4>
    </property>
    <property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="4" name="Reviewed">
        <vt:bool>1</vt:bool>
    </property>
    <property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="5" name="Score">
        <vt:r8>7.5</vt:r8>
    </property>
</Properties>"#;
        let mut archive = package(&[("docProps/custom.xml", xml)]);
        let props = extract_custom_properties(&mut archive).unwrap();

        assert_eq!(props.get("Classification"), Some(&Value::String("TLP:AMBER".to_string())));
        assert_eq!(props.get("IndicatorCount"), Some(&Value::from(87)));
        assert_eq!(props.get("Reviewed"), Some(&Value::Bool(true)));
        assert_eq!(props.get("Score"), Some(&serde_json::json!(7.5)));
    }

    #[test]
    fn test_unknown_variant_is_skipped() {
        let xml = r#"<Properties xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">
    <property name="Blob"><vt:blob>AAAA</vt:blob></property>
    <property><vt:lpwstr>nameless</vt:lpwstr></property>
</Properties>"#;
        let mut archive = package(&[("docProps/custom.xml", xml)]);
        assert!(extract_custom_properties(&mut archive).unwrap().is_empty());
    }

    #[test]
    fn test_missing_custom_xml() {
        let mut archive = package(&[]);
        assert!(extract_custom_properties(&mut archive).unwrap().is_empty());
    }
}
