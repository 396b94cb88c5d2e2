//! Word processor (`.docx`, legacy `.doc`).

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::legacy::{LegacyFormat, is_ole_container, legacy_extraction};
use crate::core::config::ProcessingOptions;
use crate::core::io::{ZIP_SIGNATURE, extension_of, has_signature};
use crate::extraction::docx::extract_docx;
use crate::plugins::{DocumentProcessor, Plugin};
use crate::types::Extraction;
use crate::{Result, ThreatdocError};

/// Built-in Word strategy.
///
/// `.docx` packages are parsed for body text, tables, headers and footers.
/// `.doc` files only pass an OLE signature check and receive a placeholder.
#[derive(Debug, Default)]
pub struct WordProcessor;

impl WordProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for WordProcessor {
    fn name(&self) -> &str {
        "word"
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
        "Word documents (.docx, legacy .doc placeholder)"
    }
}

#[async_trait]
impl DocumentProcessor for WordProcessor {
    fn supported_extensions(&self) -> Vec<String> {
        vec!["docx".to_string(), "doc".to_string()]
    }

    async fn validate(&self, path: &Path) -> Result<bool> {
        match extension_of(path).as_deref() {
            Some("doc") => is_ole_container(path).await,
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
        if extension_of(path).as_deref() == Some("doc") {
            return Ok(legacy_extraction(LegacyFormat::Doc, path));
        }

        let bytes = content.to_vec();
        let options = options.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || extract_docx(&bytes, &options, &cancel))
            .await
            .map_err(|e| ThreatdocError::Other(format!("DOCX extraction task failed: {}", e)))?
    }
}
