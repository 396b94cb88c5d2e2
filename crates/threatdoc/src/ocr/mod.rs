//! OCR subsystem.
//!
//! The [`OcrBackend`](crate::plugins::OcrBackend) trait is the seam processors use.
//! With the `ocr` feature enabled, [`engine::OcrEngine`] implements it on top of a
//! single Tesseract context.

pub mod error;
pub mod types;
pub mod validation;

#[cfg(feature = "ocr")]
pub mod engine;

pub use error::OcrError;
pub use types::OcrResult;
pub use validation::validate_language_code;

#[cfg(feature = "ocr")]
pub use engine::OcrEngine;
