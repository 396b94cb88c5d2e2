//! Document processor plugin trait.
//!
//! A [`DocumentProcessor`] is one format strategy: it declares the file extensions
//! it handles, checks the container signature, and extracts text plus metadata.
//! The shared processing template (preconditions, truncation, TLP classification,
//! status handling) is provided by [`DocumentProcessor::process`] and normally
//! should not be overridden.

use crate::Result;
use crate::core::config::ProcessingOptions;
use crate::core::pipeline;
use crate::plugins::Plugin;
use crate::types::{Document, Extraction};
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Trait for format-specific document processors.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use std::path::Path;
/// use threatdoc::core::config::ProcessingOptions;
/// use threatdoc::plugins::{DocumentProcessor, Plugin};
/// use threatdoc::types::Extraction;
/// use threatdoc::{CancellationToken, Result};
///
/// struct StixProcessor;
///
/// impl Plugin for StixProcessor {
///     fn name(&self) -> &str { "stix-processor" }
///     fn version(&self) -> String { "1.0.0".to_string() }
///     fn initialize(&self) -> Result<()> { Ok(()) }
///     fn shutdown(&self) -> Result<()> { Ok(()) }
/// }
///
/// #[async_trait]
/// impl DocumentProcessor for StixProcessor {
///     fn supported_extensions(&self) -> Vec<String> {
///         vec!["stix".to_string()]
///     }
///
///     async fn validate(&self, _path: &Path) -> Result<bool> {
///         Ok(true)
///     }
///
///     async fn extract(
///         &self,
///         content: &[u8],
///         _path: &Path,
///         _options: &ProcessingOptions,
///         _cancel: &CancellationToken,
///     ) -> Result<Extraction> {
///         Ok(Extraction {
///             text: String::from_utf8_lossy(content).into_owned(),
///             page_count: 1,
///             ..Default::default()
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait DocumentProcessor: Plugin {
    /// Extensions this processor handles, without the leading dot.
    ///
    /// Must be non-empty; matching is case-insensitive.
    fn supported_extensions(&self) -> Vec<String>;

    /// Selection priority. Higher wins; equal priorities resolve to the processor
    /// registered first.
    fn priority(&self) -> i32 {
        50
    }

    /// Whether the extension of `path` is one of [`supported_extensions`](Self::supported_extensions).
    fn can_process(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.supported_extensions()
            .iter()
            .any(|supported| supported.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }

    /// Check the file's container signature.
    ///
    /// Returns `Ok(false)` for a mismatch; the pipeline records that as a
    /// validation failure on the document.
    async fn validate(&self, path: &Path) -> Result<bool>;

    /// Extract text, page count and metadata from the file content.
    ///
    /// Implementations check `cancel` between extraction units (page, paragraph
    /// block, row batch) and return [`ThreatdocError::Cancelled`](crate::ThreatdocError::Cancelled)
    /// once it fires. Metadata faults should be downgraded to warnings on the
    /// returned [`Extraction`].
    async fn extract(
        &self,
        content: &[u8],
        path: &Path,
        options: &ProcessingOptions,
        cancel: &CancellationToken,
    ) -> Result<Extraction>;

    /// Process one file into a [`Document`].
    ///
    /// # Errors
    ///
    /// Only preconditions are returned as `Err`: `NotFound`, `SizeExceeded`, and
    /// `Validation` for invalid options. Every other failure yields
    /// `Ok(document)` with `status = Failed`.
    async fn process(&self, path: &Path, options: &ProcessingOptions, cancel: &CancellationToken) -> Result<Document> {
        pipeline::run(self, path, options, cancel).await
    }
}
