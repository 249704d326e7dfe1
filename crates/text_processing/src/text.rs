//! Shared text helpers

use unicode_segmentation::UnicodeSegmentation;

/// Lowercase, fold Twi open vowels (ɛ -> e, ɔ -> o), straighten curly
/// apostrophes and collapse whitespace
///
/// Speech-to-text output for Twi is inconsistent about the open vowels, so
/// every pattern in this crate is written against the folded form.
pub fn fold(text: &str) -> String {
    let lowered: String = text
        .chars()
        .map(|c| match c {
            'ɛ' | 'Ɛ' => 'e',
            'ɔ' | 'Ɔ' => 'o',
            '’' | '‘' => '\'',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key under which two transcripts are considered the same request
///
/// Folds case and vowels, drops punctuation, collapses whitespace.
pub fn canonical_key(text: &str) -> String {
    let folded = fold(text);
    folded
        .unicode_words()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title-case every word ("garden eggs" -> "Garden Eggs")
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut graphemes = word.graphemes(true);
            match graphemes.next() {
                Some(first) => {
                    let rest: String = graphemes.collect();
                    format!("{}{}", first.to_uppercase(), rest.to_lowercase())
                },
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold() {
        assert_eq!(fold("Ɛyɛ  sɛn?"), "eye sen?");
        assert_eq!(fold("  How MUCH  "), "how much");
        assert_eq!(fold("I’ll take it"), "i'll take it");
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key("How much for Tilapia?!"), "how much for tilapia");
        assert_eq!(
            canonical_key("how much   for tilapia"),
            canonical_key("HOW MUCH FOR TILAPIA.")
        );
        assert_eq!(canonical_key("2.50 cedis"), "2.50 cedis");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("tilapia"), "Tilapia");
        assert_eq!(title_case("GARDEN eggs"), "Garden Eggs");
        assert_eq!(title_case(""), "");
    }
}
