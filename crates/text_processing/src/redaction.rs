//! Snippet redaction
//!
//! Transaction snippets leave the engine (storage, sync), so phone numbers
//! and long digit runs such as mobile-money references are masked first.

use once_cell::sync::Lazy;
use regex::Regex;

// Ghana mobile numbers: 0XX XXX XXXX or +233 XX XXX XXXX
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?233[\s-]?|\b0)[235]\d(?:[\s-]?\d){7}\b").unwrap()
});

static LONG_DIGITS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{9,}\b").unwrap());

/// Mask sensitive numbers and cap the result at `max_chars` characters
pub fn redact_snippet(text: &str, max_chars: usize) -> String {
    let masked = PHONE_PATTERN.replace_all(text, "[PHONE]");
    let masked = LONG_DIGITS_PATTERN.replace_all(&masked, "[NUMBER]");
    truncate_chars(&masked, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut truncated: String = text.chars().take(max_chars - 1).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_local_phone() {
        let out = redact_snippet("send momo to 0244123456 please", 200);
        assert_eq!(out, "send momo to [PHONE] please");
    }

    #[test]
    fn test_masks_international_phone() {
        let out = redact_snippet("call +233 24 412 3456", 200);
        assert_eq!(out, "call [PHONE]");
    }

    #[test]
    fn test_masks_long_reference() {
        let out = redact_snippet("ref 1234567890123 done", 200);
        assert_eq!(out, "ref [NUMBER] done");
    }

    #[test]
    fn test_keeps_prices() {
        assert_eq!(redact_snippet("25 cedis per kilo", 200), "25 cedis per kilo");
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let out = redact_snippet("ɛyɛ sɛn ɛyɛ sɛn", 5);
        assert_eq!(out.chars().count(), 5);
        assert!(out.ends_with('…'));
    }
}
