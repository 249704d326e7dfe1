//! Spoken number parsing
//!
//! Market speech mixes digits with English and Twi number words
//! ("twenty five cedis", "du nnum"). Inputs are expected in folded form
//! (see [`crate::text::fold`]); [`parse_number`] folds its input again.

use crate::text::fold;

/// Alternation of every number word, for embedding in extraction regexes
pub(crate) const NUMBER_WORDS: &str = "zero|one|two|three|four|five|six|seven|eight|nine|ten|\
eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty|thirty|\
forty|fifty|sixty|seventy|eighty|ninety|hundred|thousand|\
baako|biako|abien|mmienu|abiesa|mmiensa|anan|nnan|enum|nnum|nsia|nson|nwotwe|nkron|edu|du|\
aduonu|aduasa|aduanan|aduonum|aduosia|aduoson|aduowotwe|aduokron|oha";

/// Value of a single number word (English or Twi)
///
/// # Examples
/// ```
/// use voice_ledger_text_processing::numbers::word_to_number;
/// assert_eq!(word_to_number("twenty"), Some(20.0));
/// assert_eq!(word_to_number("nnum"), Some(5.0));
/// assert_eq!(word_to_number("cedis"), None);
/// ```
pub fn word_to_number(word: &str) -> Option<f64> {
    let value = match word {
        "zero" => 0.0,
        "one" | "a" | "an" | "baako" | "biako" => 1.0,
        "two" | "abien" | "mmienu" => 2.0,
        "three" | "abiesa" | "mmiensa" => 3.0,
        "four" | "anan" | "nnan" => 4.0,
        "five" | "enum" | "nnum" => 5.0,
        "six" | "nsia" => 6.0,
        "seven" | "nson" => 7.0,
        "eight" | "nwotwe" => 8.0,
        "nine" | "nkron" => 9.0,
        "ten" | "edu" | "du" => 10.0,
        "eleven" => 11.0,
        "twelve" => 12.0,
        "thirteen" => 13.0,
        "fourteen" => 14.0,
        "fifteen" => 15.0,
        "sixteen" => 16.0,
        "seventeen" => 17.0,
        "eighteen" => 18.0,
        "nineteen" => 19.0,
        "twenty" | "aduonu" => 20.0,
        "thirty" | "aduasa" => 30.0,
        "forty" | "aduanan" => 40.0,
        "fifty" | "aduonum" => 50.0,
        "sixty" | "aduosia" => 60.0,
        "seventy" | "aduoson" => 70.0,
        "eighty" | "aduowotwe" => 80.0,
        "ninety" | "aduokron" => 90.0,
        "oha" => 100.0,
        _ => return None,
    };
    Some(value)
}

/// Parse digits ("1,200", "2.50") or a run of number words
///
/// Returns `None` for anything that is not entirely numeric, and for
/// negative or non-finite values.
pub fn parse_number(text: &str) -> Option<f64> {
    let folded = fold(text);
    let trimmed = folded.trim();
    if trimmed.is_empty() {
        return None;
    }

    let digits: String = trimmed.chars().filter(|c| *c != ',').collect();
    if let Ok(value) = digits.parse::<f64>() {
        return (value.is_finite() && value >= 0.0).then_some(value);
    }

    parse_number_words(trimmed)
}

fn parse_number_words(text: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut current = 0.0;
    let mut seen = false;

    for token in text.split(|c: char| c.is_whitespace() || c == '-') {
        match token {
            "" | "and" | "na" => continue,
            "hundred" => {
                current = if current == 0.0 { 100.0 } else { current * 100.0 };
            },
            "thousand" => {
                let base = if current == 0.0 { 1.0 } else { current };
                total += base * 1000.0;
                current = 0.0;
            },
            word => current += word_to_number(word)?,
        }
        seen = true;
    }

    seen.then_some(total + current)
}
