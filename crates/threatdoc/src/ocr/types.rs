use serde::{Deserialize, Serialize};

/// Outcome of recognising one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub success: bool,
    pub text: String,
    /// Mean word confidence, 0.0 to 1.0.
    pub confidence: f32,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl OcrResult {
    pub fn recognized(text: String, confidence: f32, language: impl Into<String>) -> Self {
        Self {
            success: true,
            text,
            confidence: confidence.clamp(0.0, 1.0),
            language: language.into(),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            success: false,
            text: String::new(),
            confidence: 0.0,
            language: language.into(),
            error_message: Some(message.into()),
        }
    }

    /// Whether `confidence * 100` falls under the advisory threshold.
    pub fn is_below_threshold(&self, min_confidence: u8) -> bool {
        self.confidence * 100.0 < f32::from(min_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let result = OcrResult::recognized("text".to_string(), 0.42, "eng");
        assert!(result.is_below_threshold(60));
        assert!(!result.is_below_threshold(40));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(OcrResult::recognized(String::new(), 1.7, "eng").confidence, 1.0);
    }

    #[test]
    fn test_failed_result() {
        let result = OcrResult::failed("no text layer", "deu");
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("no text layer"));
    }
}
