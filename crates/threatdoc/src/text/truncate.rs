//! Character-exact truncation of extracted text.

/// Cut `text` to at most `max_chars` characters.
///
/// Returns `None` when the text already fits. The result always holds exactly
/// `max_chars` characters when truncation happens, even if the cut lands inside a
/// synthetic page or sheet marker line.
pub fn truncate_chars(text: &str, max_chars: usize) -> Option<String> {
    let (cut, _) = text.char_indices().nth(max_chars)?;
    Some(text[..cut].to_string())
}

/// Whether `line` is one of the synthetic section markers processors emit
/// (`--- Page 3 ---`, `--- Sheet: Indicators ---`, `--- Header ---`).
pub fn is_marker_line(line: &str) -> bool {
    let line = line.trim();
    line.len() > 8 && line.starts_with("--- ") && line.ends_with(" ---")
}

/// Whether truncating at `max_chars` leaves a partial marker line at the end.
pub fn cut_splits_marker(text: &str, max_chars: usize) -> bool {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return false;
    };
    let line_start = text[..cut].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[cut..].find('\n').map(|i| cut + i).unwrap_or(text.len());
    line_start < cut && is_marker_line(&text[line_start..line_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_chars("abc", 3), None);
        assert_eq!(truncate_chars("", 10), None);
    }

    #[test]
    fn test_exact_length_after_truncation() {
        let text = "x".repeat(5000);
        let out = truncate_chars(&text, 1234).unwrap();
        assert_eq!(out.chars().count(), 1234);
    }

    #[test]
    fn test_multibyte_boundary() {
        let text = "ääääää";
        let out = truncate_chars(text, 4).unwrap();
        assert_eq!(out, "ääää");
    }

    #[test]
    fn test_marker_detection() {
        assert!(is_marker_line("--- Page 12 ---"));
        assert!(is_marker_line("--- Sheet: IOCs ---"));
        assert!(!is_marker_line("- list item"));
        assert!(!is_marker_line("------"));
    }

    #[test]
    fn test_cut_splits_marker() {
        let text = "body\n--- Page 2 ---\nmore";
        assert!(cut_splits_marker(text, 9));
        assert!(!cut_splits_marker(text, 5));
        assert!(!cut_splits_marker(text, 2));
    }
}
