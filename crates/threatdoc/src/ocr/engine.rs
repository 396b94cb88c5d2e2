//! Tesseract-backed OCR engine.
//!
//! The engine owns one long-lived Tesseract context bound to a trained-data
//! directory. The context is initialised on first use, re-initialised when a
//! different language is requested, and released on shutdown. Recognition runs on
//! the blocking pool behind a mutex, so at most one recognition is in flight
//! against the context at any time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use kreuzberg_tesseract::TesseractAPI;
use parking_lot::Mutex;

use crate::core::config::OcrSettings;
use crate::ocr::error::OcrError;
use crate::ocr::types::OcrResult;
use crate::ocr::validation::validate_language_code;
use crate::plugins::{OcrBackend, Plugin};
use crate::{Result, ThreatdocError};

struct TesseractContext {
    api: TesseractAPI,
    language: String,
}

pub struct OcrEngine {
    tessdata_dir: Option<PathBuf>,
    default_language: String,
    context: Arc<Mutex<Option<TesseractContext>>>,
}

impl OcrEngine {
    /// Create an engine for `settings`, defaulting to English.
    pub fn new(settings: &OcrSettings) -> Self {
        Self::with_language(settings, "eng")
    }

    pub fn with_language(settings: &OcrSettings, language: impl Into<String>) -> Self {
        Self {
            tessdata_dir: settings.resolve_tessdata_dir(),
            default_language: language.into(),
            context: Arc::new(Mutex::new(None)),
        }
    }

    pub fn tessdata_dir(&self) -> Option<&Path> {
        self.tessdata_dir.as_deref()
    }

    fn traineddata_present(dir: &Path, language: &str) -> bool {
        language
            .split('+')
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .all(|lang| dir.join(format!("{}.traineddata", lang)).is_file())
    }

    fn recognize(
        context: &Mutex<Option<TesseractContext>>,
        tessdata_dir: &Path,
        image_bytes: &[u8],
        language: &str,
    ) -> std::result::Result<(String, i32), OcrError> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| OcrError::ImageDecodingFailed(e.to_string()))?;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let bytes_per_pixel = 3;
        let bytes_per_line = width * bytes_per_pixel;

        let mut guard = context.lock();

        if guard.as_ref().is_none_or(|ctx| ctx.language != language) {
            let api = TesseractAPI::new();
            let datapath = tessdata_dir.to_string_lossy();
            api.init(datapath.as_ref(), language).map_err(|e| {
                OcrError::InitializationFailed(format!("Failed to initialize language '{}': {}", language, e))
            })?;
            tracing::debug!(language, tessdata = %datapath, "Initialized Tesseract context");
            *guard = Some(TesseractContext {
                api,
                language: language.to_string(),
            });
        }

        let ctx = guard
            .as_ref()
            .ok_or_else(|| OcrError::InitializationFailed("Tesseract context missing".to_string()))?;

        ctx.api
            .set_image(
                rgb.as_raw(),
                width as i32,
                height as i32,
                bytes_per_pixel as i32,
                bytes_per_line as i32,
            )
            .map_err(|e| OcrError::RecognitionFailed(format!("Failed to set image: {}", e)))?;

        ctx.api
            .recognize()
            .map_err(|e| OcrError::RecognitionFailed(format!("Failed to recognize text: {}", e)))?;

        let text = ctx
            .api
            .get_utf8_text()
            .map_err(|e| OcrError::RecognitionFailed(format!("Failed to extract text: {}", e)))?;
        let confidence = ctx
            .api
            .mean_text_conf()
            .map_err(|e| OcrError::RecognitionFailed(format!("Failed to read confidence: {}", e)))?;

        Ok((text, confidence))
    }
}

impl Plugin for OcrEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn version(&self) -> String {
        TesseractAPI::version()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        if self.context.lock().take().is_some() {
            tracing::debug!("Released Tesseract context");
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Tesseract OCR engine"
    }
}

#[async_trait]
impl OcrBackend for OcrEngine {
    async fn process_image(&self, image_bytes: &[u8], language: &str, min_confidence: u8) -> Result<OcrResult> {
        let language = if language.trim().is_empty() {
            self.default_language.clone()
        } else {
            language.trim().to_string()
        };
        validate_language_code(&language)?;

        let tessdata_dir = self
            .tessdata_dir
            .clone()
            .filter(|dir| dir.is_dir())
            .ok_or_else(|| OcrError::Unavailable("Tesseract trained-data directory not found".to_string()))?;

        let context = Arc::clone(&self.context);
        let image_bytes = image_bytes.to_vec();
        let task_language = language.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            Self::recognize(&context, &tessdata_dir, &image_bytes, &task_language)
        })
        .await
        .map_err(|e| ThreatdocError::plugin("tesseract", format!("Tesseract task panicked: {}", e)))?;

        let (text, mean_confidence) = match outcome {
            Ok(recognized) => recognized,
            Err(OcrError::ImageDecodingFailed(message)) => {
                return Ok(OcrResult::failed(message, language));
            }
            Err(err) => return Err(err.into()),
        };

        let result = OcrResult::recognized(text.trim().to_string(), mean_confidence as f32 / 100.0, language);
        if result.is_below_threshold(min_confidence) {
            tracing::warn!(
                confidence = mean_confidence,
                min_confidence,
                "OCR confidence below threshold; keeping recognized text"
            );
        }
        Ok(result)
    }

    fn is_available(&self) -> bool {
        self.tessdata_dir
            .as_deref()
            .is_some_and(|dir| dir.is_dir() && Self::traineddata_present(dir, &self.default_language))
    }
}
