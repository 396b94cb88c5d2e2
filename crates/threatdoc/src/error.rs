//! Error types for threatdoc.
//!
//! Every fallible operation in the crate returns [`ThreatdocError`]. The enum is
//! built with `thiserror`, keeps error chains through `#[source]`, and carries
//! enough context (paths, limits, plugin names) to be useful in a log line.
//!
//! # Error Handling Philosophy
//!
//! **Preconditions are returned as `Err`:**
//! - [`ThreatdocError::NotFound`], [`ThreatdocError::SizeExceeded`] and
//!   [`ThreatdocError::UnsupportedFormat`] are raised before a processing attempt begins.
//! - `ThreatdocError::Io` (from `std::io::Error`) always bubbles up unchanged.
//!
//! **Everything else is captured in the returned document:**
//! - Once an attempt has started, failures such as `Parsing`, `PasswordProtected`
//!   or `Cancelled` are recorded on the [`Document`](crate::types::Document) with
//!   `status = Failed` and a human readable message, so batch callers can keep going.
//!
//! Use [`ThreatdocError::kind`] to map any error onto the coarse [`ErrorKind`]
//! taxonomy stored on failed documents.
//!
//! # Example
//!
//! ```rust
//! use threatdoc::{ErrorKind, ThreatdocError};
//!
//! let err = ThreatdocError::validation("not a ZIP container");
//! assert_eq!(err.kind(), ErrorKind::ValidationFailed);
//! assert!(!err.kind().is_precondition());
//! ```
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `ThreatdocError`.
pub type Result<T> = std::result::Result<T, ThreatdocError>;

/// Main error type for all threatdoc operations.
#[derive(Debug, Error)]
pub enum ThreatdocError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("File {} is {size_bytes} bytes, exceeding the {limit_mb} MB limit", path.display())]
    SizeExceeded {
        path: PathBuf,
        size_bytes: u64,
        limit_mb: u64,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Password protected: {0}")]
    PasswordProtected(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Parsing error: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("OCR error: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Processing was cancelled")]
    Cancelled,

    #[error("Plugin error in '{plugin_name}': {message}")]
    Plugin { message: String, plugin_name: String },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse failure taxonomy recorded on failed documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    SizeExceeded,
    UnsupportedFormat,
    PasswordProtected,
    ValidationFailed,
    Cancelled,
    Unexpected,
}

impl ErrorKind {
    /// Whether this kind is raised before a processing attempt begins.
    pub fn is_precondition(self) -> bool {
        matches!(self, Self::NotFound | Self::SizeExceeded | Self::UnsupportedFormat)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::SizeExceeded => "size_exceeded",
            Self::UnsupportedFormat => "unsupported_format",
            Self::PasswordProtected => "password_protected",
            Self::ValidationFailed => "validation_failed",
            Self::Cancelled => "cancelled",
            Self::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "excel")]
impl From<calamine::Error> for ThreatdocError {
    fn from(err: calamine::Error) -> Self {
        ThreatdocError::Parsing {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(any(feature = "office", feature = "excel"))]
impl From<zip::result::ZipError> for ThreatdocError {
    fn from(err: zip::result::ZipError) -> Self {
        ThreatdocError::Parsing {
            message: format!("Invalid ZIP container: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for ThreatdocError {
    fn from(err: serde_json::Error) -> Self {
        ThreatdocError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "pdf")]
impl From<crate::pdf::error::PdfError> for ThreatdocError {
    fn from(err: crate::pdf::error::PdfError) -> Self {
        use crate::pdf::error::PdfError;

        match err {
            PdfError::PasswordRequired => ThreatdocError::PasswordProtected(err.to_string()),
            PdfError::InvalidPassword => ThreatdocError::PasswordProtected(err.to_string()),
            PdfError::Cancelled => ThreatdocError::Cancelled,
            other => ThreatdocError::Parsing {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl ThreatdocError {
    error_constructor!(parsing, Parsing);
    error_constructor!(ocr, Ocr);
    error_constructor!(validation, Validation);
    error_constructor!(serialization, Serialization);

    pub fn plugin<S: Into<String>, N: Into<String>>(plugin_name: N, message: S) -> Self {
        Self::Plugin {
            message: message.into(),
            plugin_name: plugin_name.into(),
        }
    }

    /// Map this error onto the document failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::SizeExceeded { .. } => ErrorKind::SizeExceeded,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::PasswordProtected(_) => ErrorKind::PasswordProtected,
            Self::Validation { .. } => ErrorKind::ValidationFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(err) if err.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::Unexpected,
        }
    }
}
