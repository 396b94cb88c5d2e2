//! Tesseract language code validation.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use super::error::OcrError;

/// Language packs shipped with Tesseract 5 (`*.traineddata` stems).
const TESSERACT_LANGUAGE_CODES: &[&str] = &[
    "afr", "amh", "ara", "asm", "aze", "aze_cyrl", "bel", "ben", "bod", "bos", "bre", "bul", "cat",
    "ceb", "ces", "chi_sim", "chi_tra", "chr", "cos", "cym", "dan", "deu", "div", "dzo", "ell", "eng",
    "enm", "epo", "equ", "est", "eus", "fao", "fas", "fil", "fin", "fra", "frk", "frm", "fry", "gla",
    "gle", "glg", "grc", "guj", "hat", "heb", "hin", "hrv", "hun", "hye", "iku", "ind", "isl", "ita",
    "ita_old", "jav", "jpn", "kan", "kat", "kat_old", "kaz", "khm", "kir", "kmr", "kor", "lao", "lat",
    "lav", "lit", "ltz", "mal", "mar", "mkd", "mlt", "mon", "mri", "msa", "mya", "nep", "nld", "nor",
    "oci", "ori", "osd", "pan", "pol", "por", "pus", "que", "ron", "rus", "san", "sin", "slk", "slv",
    "snd", "spa", "spa_old", "sqi", "srp", "srp_latn", "sun", "swa", "swe", "syr", "tam", "tat", "tel",
    "tgk", "tha", "tir", "ton", "tur", "uig", "ukr", "urd", "uzb", "uzb_cyrl", "vie", "yid", "yor",
];

static LANGUAGE_CODE_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| TESSERACT_LANGUAGE_CODES.iter().copied().collect());

/// Whether `code` names a single Tesseract language pack.
pub fn is_supported_language(code: &str) -> bool {
    LANGUAGE_CODE_SET.contains(code)
}

/// Validate a language string such as `eng` or `eng+deu`.
pub fn validate_language_code(languages: &str) -> Result<(), OcrError> {
    let languages = languages.trim();
    if languages.is_empty() {
        return Err(OcrError::InvalidLanguageCode("Language cannot be empty".to_string()));
    }
    for code in languages.split('+').map(str::trim) {
        if !is_supported_language(code) {
            return Err(OcrError::InvalidLanguageCode(format!(
                "Language code '{}' is not a Tesseract language pack",
                code
            )));
        }
    }
    Ok(())
}
