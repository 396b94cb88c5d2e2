//! Built-in format processors.
//!
//! The PDF, Word and Excel strategies are registered with the global
//! [`StrategyRegistry`] on the first processing call. Hosts that manage their own
//! registry call [`register_default_processors`] directly.

use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};

use crate::core::config::OcrSettings;
use crate::plugins::registry::poisoned;
use crate::plugins::{OcrBackend, StrategyRegistry, get_strategy_registry};
use crate::{Result, ThreatdocError};

pub mod legacy;

#[cfg(feature = "excel")]
pub mod excel;

#[cfg(feature = "pdf")]
pub mod pdf;

#[cfg(feature = "office")]
pub mod word;

#[cfg(feature = "excel")]
pub use excel::ExcelProcessor;

#[cfg(feature = "pdf")]
pub use pdf::PdfProcessor;

#[cfg(feature = "office")]
pub use word::WordProcessor;

/// Register the built-in processors enabled by the crate features.
///
/// `ocr` becomes the PDF processor's fallback backend. Processors already present
/// under the same name are left untouched.
///
/// # Example
///
/// ```rust
/// use threatdoc::plugins::StrategyRegistry;
/// use threatdoc::processors::register_default_processors;
///
/// # fn main() -> threatdoc::Result<()> {
/// let mut registry = StrategyRegistry::new();
/// register_default_processors(&mut registry, None)?;
/// # #[cfg(feature = "pdf")]
/// assert!(registry.contains("pdf"));
/// # Ok(())
/// # }
/// ```
#[allow(unused_variables)]
pub fn register_default_processors(registry: &mut StrategyRegistry, ocr: Option<Arc<dyn OcrBackend>>) -> Result<()> {
    #[cfg(feature = "pdf")]
    registry.register(Arc::new(match ocr {
        Some(backend) => PdfProcessor::with_ocr(backend),
        None => PdfProcessor::new(),
    }))?;

    #[cfg(feature = "office")]
    registry.register(Arc::new(WordProcessor::new()))?;

    #[cfg(feature = "excel")]
    registry.register(Arc::new(ExcelProcessor::new()))?;

    Ok(())
}

/// OCR backend built from `settings`, or `None` without the `ocr` feature.
#[cfg(feature = "ocr")]
pub fn ocr_backend_for(settings: &OcrSettings) -> Option<Arc<dyn OcrBackend>> {
    let engine = crate::ocr::OcrEngine::new(settings);
    if !engine.is_available() {
        tracing::debug!(
            tessdata = ?engine.tessdata_dir(),
            "Tesseract trained data not found; PDF OCR fallback will report unavailable"
        );
    }
    Some(Arc::new(engine))
}

/// OCR backend built from `settings`, or `None` without the `ocr` feature.
#[cfg(not(feature = "ocr"))]
pub fn ocr_backend_for(_settings: &OcrSettings) -> Option<Arc<dyn OcrBackend>> {
    None
}

type SharedOcr = (OcrSettings, Option<Arc<dyn OcrBackend>>);

// Settings and backend the global built-ins were registered with.
static SHARED_OCR: OnceCell<SharedOcr> = OnceCell::new();

fn shared_ocr(settings: &OcrSettings) -> &'static SharedOcr {
    SHARED_OCR.get_or_init(|| (settings.clone(), ocr_backend_for(settings)))
}

fn register_into_global() -> Result<()> {
    let (_, backend) = shared_ocr(&OcrSettings::default());
    let registry = get_strategy_registry();
    let mut registry = registry.write().map_err(poisoned)?;
    register_default_processors(&mut registry, backend.clone())
}

static PROCESSORS_INITIALIZED: Lazy<Result<()>> = Lazy::new(register_into_global);

/// Ensure the built-in processors are registered with the global registry.
///
/// Registration happens once; if the registry has since been emptied the
/// defaults are registered again.
pub fn ensure_initialized() -> Result<()> {
    PROCESSORS_INITIALIZED
        .as_ref()
        .map(|_| ())
        .map_err(|e| ThreatdocError::plugin("built-in-processors", format!("Failed to register default processors: {}", e)))?;

    let registry = get_strategy_registry();
    let is_empty = registry.read().map_err(poisoned)?.is_empty();
    if is_empty {
        register_into_global()?;
    }

    Ok(())
}

/// Register the built-ins with the global registry using `settings` for the
/// PDF OCR fallback, and return that OCR backend so it can be shared (for
/// example through a plugin context).
///
/// Call this before the first processing call. Once the built-ins exist, asking
/// for different settings fails with `ThreatdocError::Validation`.
///
/// # Example
///
/// ```rust,no_run
/// use threatdoc::PipelineConfig;
///
/// # fn main() -> threatdoc::Result<()> {
/// let config = PipelineConfig::from_file("threatdoc.toml")?;
/// let ocr = threatdoc::processors::initialize_with(&config.ocr)?;
/// # let _ = ocr;
/// # Ok(())
/// # }
/// ```
pub fn initialize_with(settings: &OcrSettings) -> Result<Option<Arc<dyn OcrBackend>>> {
    let (active, backend) = shared_ocr(settings);
    if active != settings {
        return Err(ThreatdocError::validation(format!(
            "Built-in processors are already initialized with OCR settings {:?}",
            active
        )));
    }
    ensure_initialized()?;
    Ok(backend.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_default_processors() {
        let mut registry = StrategyRegistry::new();
        register_default_processors(&mut registry, None).unwrap();

        #[allow(unused_mut)]
        let mut expected = Vec::<&str>::new();
        #[cfg(feature = "pdf")]
        expected.push("pdf");
        #[cfg(feature = "office")]
        expected.push("word");
        #[cfg(feature = "excel")]
        expected.push("excel");

        assert_eq!(registry.list(), expected);

        register_default_processors(&mut registry, None).unwrap();
        assert_eq!(registry.len(), expected.len());
    }

    #[test]
    fn test_initialize_with_rejects_conflicting_settings() {
        ensure_initialized().unwrap();
        let backend = initialize_with(&OcrSettings::default()).unwrap();
        assert_eq!(backend.is_some(), cfg!(feature = "ocr"));

        let other = OcrSettings {
            tessdata_dir: Some(std::path::PathBuf::from("/nonexistent/tessdata")),
        };
        let err = initialize_with(&other).err().unwrap();
        assert!(matches!(err, ThreatdocError::Validation { .. }));
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn test_configured_tessdata_dir_reaches_engine() {
        let tessdata = tempfile::tempdir().unwrap();
        let settings = OcrSettings {
            tessdata_dir: Some(tessdata.path().to_path_buf()),
        };

        let backend = ocr_backend_for(&settings).unwrap();
        assert!(!backend.is_available());

        std::fs::write(tessdata.path().join("eng.traineddata"), b"model").unwrap();
        assert!(backend.is_available());
    }

    #[cfg(not(feature = "ocr"))]
    #[test]
    fn test_no_ocr_backend_without_feature() {
        assert!(ocr_backend_for(&OcrSettings::default()).is_none());
    }

    #[cfg(all(feature = "pdf", feature = "office", feature = "excel"))]
    #[test]
    fn test_default_extensions() {
        let mut registry = StrategyRegistry::new();
        register_default_processors(&mut registry, None).unwrap();
        assert_eq!(registry.supported_extensions(), vec!["doc", "docx", "pdf", "xls", "xlsx"]);
    }
}
