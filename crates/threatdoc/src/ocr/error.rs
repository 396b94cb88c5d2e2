use std::fmt;

/// Errors raised inside the OCR subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    /// The trained-data directory or language pack is missing.
    Unavailable(String),
    InitializationFailed(String),
    InvalidLanguageCode(String),
    ImageDecodingFailed(String),
    RecognitionFailed(String),
}

impl fmt::Display for OcrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "OCR unavailable: {}", msg),
            Self::InitializationFailed(msg) => write!(f, "Tesseract initialization failed: {}", msg),
            Self::InvalidLanguageCode(msg) => write!(f, "Invalid language code: {}", msg),
            Self::ImageDecodingFailed(msg) => write!(f, "Image decoding failed: {}", msg),
            Self::RecognitionFailed(msg) => write!(f, "OCR recognition failed: {}", msg),
        }
    }
}

impl std::error::Error for OcrError {}

impl From<OcrError> for crate::ThreatdocError {
    fn from(err: OcrError) -> Self {
        crate::ThreatdocError::ocr_with_source(err.to_string(), err)
    }
}
