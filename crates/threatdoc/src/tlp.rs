//! Traffic Light Protocol classification.
//!
//! Markers are matched case-insensitively as substrings, in the fixed priority
//! order red, amber, green, clear/white. The first designation with any match wins,
//! so text carrying both `TLP:RED` and `TLP:GREEN` classifies as red regardless of
//! where each marker appears.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::config::ProcessingOptions;
use crate::types::TlpDesignation;

static TLP_PATTERNS: Lazy<Vec<(TlpDesignation, Regex)>> = Lazy::new(|| {
    [
        (TlpDesignation::Red, r"(?i)tlp(?::\s*|\s+)red"),
        (TlpDesignation::Amber, r"(?i)tlp(?::\s*|\s+)amber"),
        (TlpDesignation::Green, r"(?i)tlp(?::\s*|\s+)green"),
        (TlpDesignation::Clear, r"(?i)tlp(?::\s*|\s+)(?:white|clear)"),
    ]
    .into_iter()
    .filter_map(|(tlp, pattern)| match Regex::new(pattern) {
        Ok(re) => Some((tlp, re)),
        Err(e) => {
            tracing::error!(pattern, error = %e, "Invalid TLP pattern");
            None
        }
    })
    .collect()
});

/// Find the highest-priority TLP marker in `text`.
///
/// ```rust
/// use threatdoc::tlp::classify;
/// use threatdoc::TlpDesignation;
///
/// assert_eq!(classify("Distribution: tlp:green"), Some(TlpDesignation::Green));
/// assert_eq!(classify("TLP:GREEN ... TLP:RED"), Some(TlpDesignation::Red));
/// assert_eq!(classify("no marker here"), None);
/// ```
pub fn classify(text: &str) -> Option<TlpDesignation> {
    TLP_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(tlp, _)| *tlp)
}

/// Designation for a document given its text and the call options.
///
/// With auto-detection disabled the configured default is used. With it enabled,
/// unmarked text falls back to [`TlpDesignation::Amber`].
pub fn resolve(text: &str, options: &ProcessingOptions) -> TlpDesignation {
    if !options.auto_detect_tlp {
        return options.default_tlp_designation;
    }
    classify(text).unwrap_or(TlpDesignation::Amber)
}
