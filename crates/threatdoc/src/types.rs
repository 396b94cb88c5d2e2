use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, Result, ThreatdocError};

// ============================================================================
// Sensitivity
// ============================================================================

/// Traffic Light Protocol designation.
///
/// `Clear` replaced `White` in TLP 2.0; `"white"` is still accepted when
/// deserializing or parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlpDesignation {
    Red,
    #[default]
    Amber,
    Green,
    #[serde(alias = "white")]
    Clear,
}

impl TlpDesignation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "TLP:RED",
            Self::Amber => "TLP:AMBER",
            Self::Green => "TLP:GREEN",
            Self::Clear => "TLP:CLEAR",
        }
    }
}

impl std::fmt::Display for TlpDesignation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TlpDesignation {
    type Err = ThreatdocError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let color = normalized.strip_prefix("tlp:").unwrap_or(&normalized);
        match color {
            "red" => Ok(Self::Red),
            "amber" => Ok(Self::Amber),
            "green" => Ok(Self::Green),
            "clear" | "white" => Ok(Self::Clear),
            _ => Err(ThreatdocError::validation(format!("Unknown TLP designation '{}'", s))),
        }
    }
}

// ============================================================================
// Document record
// ============================================================================

/// Lifecycle state of a processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// How faithfully the extracted text represents the source document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "fidelity", rename_all = "snake_case")]
pub enum ContentFidelity {
    /// Text was extracted from the document content.
    #[default]
    Full,
    /// The format is only minimally supported; `extracted_text` is an explanatory
    /// placeholder, not document content.
    Degraded { reason: String },
}

impl ContentFidelity {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Result of one processing attempt for one file.
///
/// A document is mutated only by the processor that owns the current attempt.
/// Once `status` reaches [`DocumentStatus::Completed`] or [`DocumentStatus::Failed`]
/// every lifecycle transition is refused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub file_name: String,
    pub path: PathBuf,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    pub extracted_text: String,
    /// Length of `extracted_text` in characters.
    pub text_length: usize,
    pub page_count: usize,
    pub size_bytes: u64,
    pub is_scanned: bool,
    pub is_password_protected: bool,
    pub tlp: TlpDesignation,
    pub fidelity: ContentFidelity,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Name of the processor that owned the attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    pub metadata: DocumentMetadata,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProcessingError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ProcessingWarning>,
}

impl Document {
    /// Create a pending record for `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Self {
            id: Uuid::new_v4(),
            file_name,
            path: path.to_path_buf(),
            status: DocumentStatus::Pending,
            started_at: None,
            completed_at: None,
            extracted_text: String::new(),
            text_length: 0,
            page_count: 0,
            size_bytes: 0,
            is_scanned: false,
            is_password_protected: false,
            tlp: TlpDesignation::default(),
            fidelity: ContentFidelity::Full,
            mime_type: None,
            processor: None,
            metadata: DocumentMetadata::default(),
            error_message: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    /// Build a record that failed before an attempt could start.
    ///
    /// Used by batch callers that convert precondition errors into results.
    pub fn rejected(path: impl AsRef<Path>, err: &ThreatdocError) -> Self {
        let mut doc = Self::new(path);
        doc.started_at = Some(Utc::now());
        doc.status = DocumentStatus::Failed;
        doc.completed_at = doc.started_at;
        doc.error_message = Some(err.to_string());
        doc.error = Some(ProcessingError::from_error(err));
        doc
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(ThreatdocError::validation(format!(
                "Document '{}' is already {:?}; terminal records are immutable",
                self.file_name, self.status
            )));
        }
        Ok(())
    }

    /// Transition `Pending -> Processing` and stamp the start time.
    pub fn begin(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.status = DocumentStatus::Processing;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Replace the extracted text, keeping `text_length` in sync.
    pub fn set_text(&mut self, text: String) -> Result<()> {
        self.ensure_mutable()?;
        self.text_length = text.chars().count();
        self.extracted_text = text;
        Ok(())
    }

    pub fn warn(&mut self, warning: ProcessingWarning) -> Result<()> {
        self.ensure_mutable()?;
        tracing::debug!(file = %self.file_name, code = ?warning.code, "{}", warning.message);
        self.warnings.push(warning);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.status = DocumentStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Move to `Failed`, recording the error's message and kind.
    pub fn fail(&mut self, err: &ThreatdocError) -> Result<()> {
        self.ensure_mutable()?;
        if matches!(err, ThreatdocError::PasswordProtected(_)) {
            self.is_password_protected = true;
        }
        self.status = DocumentStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(err.to_string());
        self.error = Some(ProcessingError::from_error(err));
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == DocumentStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == DocumentStatus::Failed
    }

    /// Wall-clock duration of the attempt, once terminal.
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Descriptive metadata read from the document container.
///
/// Dates are RFC 3339 strings when they could be parsed and the raw source
/// value otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    /// Application that produced the file (PDF `Producer`, Office `Application`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    /// Authoring tool (PDF `Creator`, Office `lastModifiedBy`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, serde_json::Value>,
}

impl DocumentMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fill fields that are unset here from `other`; custom keys already present win.
    pub fn merge_missing(&mut self, other: DocumentMetadata) {
        macro_rules! take {
            ($($field:ident),*) => {
                $( if self.$field.is_none() { self.$field = other.$field; } )*
            };
        }
        take!(title, author, subject, keywords, created_at, modified_at, producer, creator, mime_type, page_count);
        for (key, value) in other.custom {
            self.custom.entry(key).or_insert(value);
        }
    }
}

// ============================================================================
// Errors and warnings attached to documents
// ============================================================================

/// Fatal error recorded on a failed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub code: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Display form of the underlying cause, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ProcessingError {
    pub fn from_error(err: &ThreatdocError) -> Self {
        let context = match err {
            ThreatdocError::Plugin { plugin_name, .. } => Some(format!("plugin: {}", plugin_name)),
            ThreatdocError::NotFound { path } | ThreatdocError::SizeExceeded { path, .. } => {
                Some(path.display().to_string())
            }
            _ => None,
        };

        Self {
            code: err.kind(),
            message: err.to_string(),
            context,
            cause: std::error::Error::source(err).map(|s| s.to_string()),
        }
    }
}

/// Advisory codes for [`ProcessingWarning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    TextTruncated,
    MetadataUnavailable,
    OcrUnavailable,
    OcrFailed,
    LowOcrConfidence,
    UnsupportedImage,
    LegacyFormat,
    PasswordSkipped,
}

/// Non-fatal condition attached to a document. Never changes `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingWarning {
    pub code: WarningCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ProcessingWarning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            cause: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_cause(mut self, cause: &dyn std::error::Error) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

// ============================================================================
// Format-level extraction output
// ============================================================================

/// What a format processor hands back to the shared pipeline.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub text: String,
    pub page_count: usize,
    pub metadata: DocumentMetadata,
    pub is_scanned: bool,
    pub fidelity: ContentFidelity,
    pub warnings: Vec<ProcessingWarning>,
}

impl Extraction {
    pub fn degraded(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fidelity: ContentFidelity::Degraded { reason: reason.into() },
            ..Default::default()
        }
    }
}
