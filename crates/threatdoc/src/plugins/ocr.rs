//! OCR backend plugin trait.

use crate::Result;
use crate::ocr::OcrResult;
use crate::plugins::Plugin;
use async_trait::async_trait;

/// Trait for OCR backends used by processors for scanned content.
///
/// A backend owns a recognition context that is not safe for concurrent use;
/// implementations serialize calls internally so callers may share one
/// `Arc<dyn OcrBackend>` across concurrent processing calls.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use threatdoc::ocr::OcrResult;
/// use threatdoc::plugins::{OcrBackend, Plugin};
/// use threatdoc::Result;
///
/// struct FixedOcr;
///
/// impl Plugin for FixedOcr {
///     fn name(&self) -> &str { "fixed-ocr" }
///     fn version(&self) -> String { "1.0.0".to_string() }
///     fn initialize(&self) -> Result<()> { Ok(()) }
///     fn shutdown(&self) -> Result<()> { Ok(()) }
/// }
///
/// #[async_trait]
/// impl OcrBackend for FixedOcr {
///     async fn process_image(&self, _image: &[u8], language: &str, _min_confidence: u8) -> Result<OcrResult> {
///         Ok(OcrResult::recognized("scanned".to_string(), 0.9, language))
///     }
///
///     fn is_available(&self) -> bool {
///         true
///     }
/// }
/// ```
#[async_trait]
pub trait OcrBackend: Plugin {
    /// Recognise text in an encoded raster image (PNG, JPEG, ...).
    ///
    /// `min_confidence` (0-100) is advisory: results under it are still returned
    /// as successful and only logged.
    async fn process_image(&self, image_bytes: &[u8], language: &str, min_confidence: u8) -> Result<OcrResult>;

    /// Whether the backend can run at all (trained data present, library loaded).
    ///
    /// Callers skip OCR with a warning when this is false.
    fn is_available(&self) -> bool;
}
