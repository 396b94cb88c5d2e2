//! Configuration loading and management.
//!
//! [`ProcessingOptions`] is the per-call options value handed to every processor.
//! [`PipelineConfig`] wraps it with host-level settings (OCR data location, plugin
//! directory, batch concurrency) and can be loaded from TOML, YAML or JSON files or
//! discovered in the directory hierarchy.

use crate::types::TlpDesignation;
use crate::{Result, ThreatdocError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Options for one processing call.
///
/// Every field has a default, so partial configuration files deserialize cleanly.
///
/// # Example
///
/// ```rust
/// use threatdoc::core::config::ProcessingOptions;
///
/// let options = ProcessingOptions {
///     enable_ocr: true,
///     max_text_content_length: 50_000,
///     ..Default::default()
/// };
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    /// Read descriptive metadata (title, author, dates, custom properties)
    #[serde(default = "default_true")]
    pub extract_metadata: bool,

    /// Extract body text
    #[serde(default = "default_true")]
    pub extract_text_content: bool,

    /// Fall back to OCR for PDFs without embedded text
    #[serde(default)]
    pub enable_ocr: bool,

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`
    #[serde(default = "default_eng")]
    pub ocr_language: String,

    /// Advisory confidence threshold, 0-100
    #[serde(default = "default_min_confidence")]
    pub ocr_min_confidence: u8,

    /// Derive the TLP designation from markers in the text
    #[serde(default = "default_true")]
    pub auto_detect_tlp: bool,

    /// Designation used when auto-detection is disabled
    #[serde(default)]
    pub default_tlp_designation: TlpDesignation,

    /// Keep bold/italic markers and render tables with pipes
    #[serde(default)]
    pub preserve_formatting: bool,

    /// Maximum extracted text length in characters
    #[serde(default = "default_max_text_content_length")]
    pub max_text_content_length: usize,

    /// Maximum input size in megabytes
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Complete password-protected files with an empty body instead of failing them
    #[serde(default)]
    pub skip_password_protected: bool,

    /// Password tried once when a protected file is encountered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_password: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_eng() -> String {
    "eng".to_string()
}

fn default_min_confidence() -> u8 {
    60
}

fn default_max_text_content_length() -> usize {
    1_000_000
}

fn default_max_file_size_mb() -> u64 {
    100
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            extract_metadata: true,
            extract_text_content: true,
            enable_ocr: false,
            ocr_language: default_eng(),
            ocr_min_confidence: default_min_confidence(),
            auto_detect_tlp: true,
            default_tlp_designation: TlpDesignation::default(),
            preserve_formatting: false,
            max_text_content_length: default_max_text_content_length(),
            max_file_size_mb: default_max_file_size_mb(),
            skip_password_protected: false,
            default_password: None,
        }
    }
}

impl ProcessingOptions {
    /// Reject option values no processor can honour.
    pub fn validate(&self) -> Result<()> {
        if self.ocr_min_confidence > 100 {
            return Err(ThreatdocError::validation(format!(
                "ocr_min_confidence must be between 0 and 100, got {}",
                self.ocr_min_confidence
            )));
        }
        if self.max_text_content_length == 0 {
            return Err(ThreatdocError::validation(
                "max_text_content_length must be greater than zero",
            ));
        }
        if self.max_file_size_mb == 0 {
            return Err(ThreatdocError::validation("max_file_size_mb must be greater than zero"));
        }
        if self.ocr_language.trim().is_empty() {
            return Err(ThreatdocError::validation("ocr_language cannot be empty"));
        }
        Ok(())
    }

    /// Size limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// OCR backend settings shared by every processing call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Directory holding `*.traineddata` files. Falls back to `TESSDATA_PREFIX`
    /// and well-known install locations when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tessdata_dir: Option<PathBuf>,
}

const TESSDATA_FALLBACK_PATHS: &[&str] = &[
    "/opt/homebrew/share/tessdata",
    "/opt/homebrew/opt/tesseract/share/tessdata",
    "/usr/local/opt/tesseract/share/tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    r#"C:\Program Files\Tesseract-OCR\tessdata"#,
    r#"C:\ProgramData\Tesseract-OCR\tessdata"#,
];

impl OcrSettings {
    /// Resolve the trained-data directory: explicit setting, then `TESSDATA_PREFIX`,
    /// then the first existing well-known location.
    pub fn resolve_tessdata_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.tessdata_dir {
            return Some(dir.clone());
        }
        if let Some(prefix) = std::env::var_os("TESSDATA_PREFIX") {
            return Some(PathBuf::from(prefix));
        }
        TESSDATA_FALLBACK_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }
}

/// Plugin host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    /// When false the host never touches the plugin directory.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

/// File-level configuration for hosts embedding the pipeline.
///
/// ```toml
/// max_concurrent_documents = 4
///
/// [processing]
/// enable_ocr = true
/// default_tlp_designation = "green"
///
/// [ocr]
/// tessdata_dir = "/usr/share/tessdata"
///
/// [plugins]
/// directory = "/opt/threatdoc/plugins"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub processing: ProcessingOptions,

    #[serde(default)]
    pub ocr: OcrSettings,

    #[serde(default)]
    pub plugins: PluginSettings,

    /// Batch concurrency (None = twice the CPU count)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_documents: Option<usize>,
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        ThreatdocError::validation(format!("Failed to read config file {}: {}", path.display(), e))
    })
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ThreatdocError::Validation` if the file is unreadable, is not valid
    /// TOML, or holds option values that fail [`ProcessingOptions::validate`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = toml::from_str(&read_config(path)?)
            .map_err(|e| ThreatdocError::validation(format!("Invalid TOML in {}: {}", path.display(), e)))?;
        config.processing.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = serde_yaml_ng::from_str(&read_config(path)?)
            .map_err(|e| ThreatdocError::validation(format!("Invalid YAML in {}: {}", path.display(), e)))?;
        config.processing.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = serde_json::from_str(&read_config(path)?)
            .map_err(|e| ThreatdocError::validation(format!("Invalid JSON in {}: {}", path.display(), e)))?;
        config.processing.validate()?;
        Ok(config)
    }

    /// Load configuration, picking the parser from the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Self::from_toml_file(path),
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            other => Err(ThreatdocError::validation(format!(
                "Unsupported config format '{}' for {} (expected .toml, .yaml, .yml or .json)",
                other,
                path.display()
            ))),
        }
    }

    /// Discover `threatdoc.toml` in the current directory or any parent.
    pub fn discover() -> Result<Option<Self>> {
        let current = std::env::current_dir().map_err(ThreatdocError::Io)?;
        Self::discover_from(&current)
    }

    pub(crate) fn discover_from(start: &Path) -> Result<Option<Self>> {
        for dir in start.ancestors() {
            let candidate = dir.join("threatdoc.toml");
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "Discovered pipeline config");
                return Ok(Some(Self::from_toml_file(candidate)?));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_options() {
        let options = ProcessingOptions::default();
        assert!(options.extract_metadata);
        assert!(options.extract_text_content);
        assert!(!options.enable_ocr);
        assert_eq!(options.ocr_language, "eng");
        assert_eq!(options.ocr_min_confidence, 60);
        assert!(options.auto_detect_tlp);
        assert_eq!(options.default_tlp_designation, TlpDesignation::Amber);
        assert_eq!(options.max_text_content_length, 1_000_000);
        assert_eq!(options.max_file_size_mb, 100);
        assert!(options.default_password.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let options = ProcessingOptions {
            ocr_min_confidence: 101,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = ProcessingOptions {
            max_text_content_length: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = ProcessingOptions {
            ocr_language: "  ".to_string(),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_max_file_size_bytes() {
        let options = ProcessingOptions {
            max_file_size_mb: 2,
            ..Default::default()
        };
        assert_eq!(options.max_file_size_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_from_toml_file_partial() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("threatdoc.toml");

        fs::write(
            &config_path,
            r#"
max_concurrent_documents = 3

[processing]
enable_ocr = true
default_tlp_designation = "green"
preserve_formatting = true

[plugins]
enabled = false
        "#,
        )
        .unwrap();

        let config = PipelineConfig::from_toml_file(&config_path).unwrap();
        assert!(config.processing.enable_ocr);
        assert!(config.processing.preserve_formatting);
        assert_eq!(config.processing.default_tlp_designation, TlpDesignation::Green);
        assert_eq!(config.processing.max_file_size_mb, 100);
        assert!(!config.plugins.enabled);
        assert_eq!(config.max_concurrent_documents, Some(3));
    }

    #[test]
    fn test_from_toml_file_rejects_invalid_options() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("threatdoc.toml");
        fs::write(&config_path, "[processing]\nocr_min_confidence = 150\n").unwrap();

        let err = PipelineConfig::from_toml_file(&config_path).unwrap_err();
        assert!(matches!(err, ThreatdocError::Validation { .. }));
    }

    #[test]
    fn test_from_yaml_and_json_files() {
        let dir = tempdir().unwrap();

        let yaml_path = dir.path().join("pipeline.yaml");
        fs::write(&yaml_path, "processing:\n  auto_detect_tlp: false\n  default_tlp_designation: red\n").unwrap();
        let config = PipelineConfig::from_file(&yaml_path).unwrap();
        assert!(!config.processing.auto_detect_tlp);
        assert_eq!(config.processing.default_tlp_designation, TlpDesignation::Red);

        let json_path = dir.path().join("pipeline.json");
        fs::write(&json_path, r#"{"processing": {"max_text_content_length": 42}}"#).unwrap();
        let config = PipelineConfig::from_file(&json_path).unwrap();
        assert_eq!(config.processing.max_text_content_length, 42);
    }

    #[test]
    fn test_from_file_unknown_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.ini");
        fs::write(&path, "").unwrap();
        assert!(PipelineConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_discover_from_parent_directory() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("threatdoc.toml"),
            "[processing]\nskip_password_protected = true\n",
        )
        .unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let config = PipelineConfig::discover_from(&nested).unwrap().unwrap();
        assert!(config.processing.skip_password_protected);
    }

    #[test]
    fn test_explicit_tessdata_dir_wins() {
        let settings = OcrSettings {
            tessdata_dir: Some(PathBuf::from("/data/tess")),
        };
        assert_eq!(settings.resolve_tessdata_dir(), Some(PathBuf::from("/data/tess")));
    }
}
