//! Strict name normalization and character n-grams.
//!
//! Both the registry (at load time) and incoming queries go through
//! [`normalize`], so the index and the scorer only ever see the canonical
//! form: lowercase ASCII letters separated by single spaces.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::canonical_combining_class;
use unicode_normalization::UnicodeNormalization;

use super::MatchError;

/// Leading honorifics dropped from names ("Dr. Juan" -> "juan").
static TITLE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(dr|dra|sr|sra|srta|ing|lic|prof)\.?\s+").expect("title pattern is valid")
});

/// Normalize a raw name for matching.
///
/// Steps, in order:
/// 1. trim + lowercase
/// 2. NFKD, dropping combining marks (accents)
/// 3. strip one leading title (`dr`, `sra.`, `prof` ...)
/// 4. anything that is not an ASCII letter or whitespace becomes a space
/// 5. collapse whitespace and trim
///
/// Never fails; empty input gives an empty string. The result is a fixed
/// point: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();

    let unaccented: String = lowered
        .nfkd()
        .filter(|c| canonical_combining_class(*c) == 0)
        .collect();

    let untitled = TITLE_PREFIX.replace(&unaccented, "");

    let letters: String = untitled
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut collapsed = letters.split_whitespace().collect::<Vec<_>>().join(" ");

    // Punctuation removal can expose a title ("dr.juan" -> "dr juan").
    while let Some(m) = TITLE_PREFIX.find(&collapsed) {
        collapsed = collapsed[m.end()..].to_string();
    }

    collapsed
}

/// Character n-grams of `text` padded with one space on each side.
///
/// When the padded text is shorter than `n` the whole padded string is the
/// only gram. Output is sorted and deduplicated.
pub fn char_ngrams(text: &str, n: usize) -> Result<Vec<String>, MatchError> {
    if n == 0 {
        return Err(MatchError::InvalidArgument(
            "n-gram length must be > 0".to_string(),
        ));
    }

    Ok(padded_grams(text, n))
}

/// [`char_ngrams`] for an `n` already known to be positive.
pub(crate) fn padded_grams(text: &str, n: usize) -> Vec<String> {
    let padded: Vec<char> = format!(" {} ", text).chars().collect();
    if padded.len() < n {
        return vec![padded.into_iter().collect()];
    }

    let mut grams: Vec<String> = padded
        .windows(n)
        .map(|w| w.iter().collect::<String>())
        .collect();
    grams.sort();
    grams.dedup();
    grams
}
