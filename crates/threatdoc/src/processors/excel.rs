//! Excel processor (`.xlsx`, legacy `.xls`).

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::legacy::{LegacyFormat, is_ole_container, legacy_extraction};
use crate::core::config::ProcessingOptions;
use crate::core::io::{ZIP_SIGNATURE, extension_of, has_signature};
use crate::extraction::excel::extract_xlsx;
use crate::plugins::{DocumentProcessor, Plugin};
use crate::types::Extraction;
use crate::{Result, ThreatdocError};

/// Built-in spreadsheet strategy. One "page" per worksheet.
#[derive(Debug, Default)]
pub struct ExcelProcessor;

impl ExcelProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for ExcelProcessor {
    fn name(&self) -> &str {
        "excel"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn description(&self) -> &str {
        "Excel workbooks (.xlsx, legacy .xls placeholder)"
    }
}

#[async_trait]
impl DocumentProcessor for ExcelProcessor {
    fn supported_extensions(&self) -> Vec<String> {
        vec!["xlsx".to_string(), "xls".to_string()]
    }

    async fn validate(&self, path: &Path) -> Result<bool> {
        match extension_of(path).as_deref() {
            Some("xls") => is_ole_container(path).await,
            _ => has_signature(path, ZIP_SIGNATURE).await,
        }
    }

    async fn extract(
        &self,
        content: &[u8],
        path: &Path,
        options: &ProcessingOptions,
        cancel: &CancellationToken,
    ) -> Result<Extraction> {
        if extension_of(path).as_deref() == Some("xls") {
            return Ok(legacy_extraction(LegacyFormat::Xls, path));
        }

        let bytes = content.to_vec();
        let options = options.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || extract_xlsx(&bytes, &options, &cancel))
            .await
            .map_err(|e| ThreatdocError::Other(format!("XLSX extraction task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::OLE_SIGNATURE;
    use crate::types::DocumentStatus;
    use std::io::Write;

    #[test]
    fn test_excel_processor_plugin_interface() {
        let processor = ExcelProcessor::new();
        assert_eq!(processor.name(), "excel");
        assert!(processor.can_process(Path::new("IOCs.XLSX")));
        assert!(processor.can_process(Path::new("old.xls")));
        assert!(!processor.can_process(Path::new("report.pdf")));
    }

    #[tokio::test]
    async fn test_xls_requires_ole_signature() {
        let mut file = tempfile::Builder::new().suffix(".xls").tempfile().unwrap();
        file.write_all(b"PK\x03\x04 this is a zip").unwrap();
        assert!(!ExcelProcessor::new().validate(file.path()).await.unwrap());

        let mut file = tempfile::Builder::new().suffix(".xls").tempfile().unwrap();
        file.write_all(OLE_SIGNATURE).unwrap();
        assert!(ExcelProcessor::new().validate(file.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_xlsx_fails_document() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"PK\x03\x04 truncated archive").unwrap();

        let doc = ExcelProcessor::new()
            .process(file.path(), &ProcessingOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error_message.is_some());
    }
}
