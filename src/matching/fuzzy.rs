//! Fuzzy scoring primitives on normalized names.
//!
//! Two signals, both on a 0-100 scale:
//! - [`edit_ratio`]: character-level alignment (Indel/LCS ratio)
//! - [`token_set_ratio`]: robust to token order, omission and repetition
//!
//! CHANGELOG:
//! - 10/19/2026 - Replaced jaro/dice strategy mix with LCS ratio + token-set ratio
//! - 01/10/2026 - Initial stub

use std::collections::BTreeSet;

/// Default weight of the token signal in the combined score.
pub const DEFAULT_W_TOKEN: f64 = 0.65;

/// Length of the longest common subsequence of two char slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    // Two-row DP, shorter string on the inner loop
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; inner.len() + 1];
    let mut curr = vec![0usize; inner.len() + 1];

    for oc in outer {
        for (j, ic) in inner.iter().enumerate() {
            curr[j + 1] = if oc == ic {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[inner.len()]
}

/// Edit similarity: `200 * matched / (len(a) + len(b))`, clamped to 0-100.
///
/// `matched` is the number of characters the two strings share in order
/// (longest common subsequence). Two empty strings are identical (100).
pub fn edit_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let total = a_chars.len() + b_chars.len();
    if total == 0 {
        return 100.0;
    }

    let matched = lcs_len(&a_chars, &b_chars);
    (200.0 * matched as f64 / total as f64).clamp(0.0, 100.0)
}

/// Join two space-separated fragments, skipping an empty one.
fn join_nonempty(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{} {}", head, tail),
    }
}

/// Token-set similarity.
///
/// Tokens of both strings are split into the shared set and the two
/// leftovers. Three strings are built from sorted tokens:
/// `shared`, `shared + only_a`, `shared + only_b`, and the best pairwise
/// [`edit_ratio`] wins. When either side has no tokens the score is 0.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let a_tokens: BTreeSet<&str> = a.split_whitespace().collect();
    let b_tokens: BTreeSet<&str> = b.split_whitespace().collect();

    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    let shared = a_tokens
        .intersection(&b_tokens)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    let only_a = a_tokens
        .difference(&b_tokens)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    let only_b = b_tokens
        .difference(&a_tokens)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    let with_a = join_nonempty(&shared, &only_a);
    let with_b = join_nonempty(&shared, &only_b);

    edit_ratio(&shared, &with_a)
        .max(edit_ratio(&shared, &with_b))
        .max(edit_ratio(&with_a, &with_b))
}

/// Weighted blend of the two signals.
pub fn combine(token_score: f64, edit_score: f64, w_token: f64) -> f64 {
    w_token * token_score + (1.0 - w_token) * edit_score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_edit_ratio_exact_and_disjoint() {
        assert!(approx(edit_ratio("juan perez", "juan perez"), 100.0));
        assert!(approx(edit_ratio("abc", "xyz"), 0.0));
        assert!(approx(edit_ratio("", ""), 100.0));
        assert!(approx(edit_ratio("abc", ""), 0.0));
    }

    #[test]
    fn test_edit_ratio_partial() {
        // lcs("kitten", "sitting") = "ittn" -> 200*4/13
        assert!(approx(edit_ratio("kitten", "sitting"), 800.0 / 13.0));
        // one typo in a 4-char word: lcs 3 of 4+4
        assert!(approx(edit_ratio("juan", "jaun"), 75.0));
    }

    #[test]
    fn test_edit_ratio_symmetric() {
        assert!(approx(
            edit_ratio("maria lopez", "mario lopes"),
            edit_ratio("mario lopes", "maria lopez")
        ));
    }

    #[test]
    fn test_token_set_order_insensitive() {
        assert!(approx(token_set_ratio("juan perez", "perez juan"), 100.0));
    }

    #[test]
    fn test_token_set_subset_is_full_match() {
        assert!(approx(token_set_ratio("juan perez", "juan carlos perez"), 100.0));
        assert!(approx(token_set_ratio("juan juan perez", "perez juan"), 100.0));
    }

    #[test]
    fn test_token_set_disjoint_and_empty() {
        assert!(approx(token_set_ratio("", "juan"), 0.0));
        assert!(approx(token_set_ratio("juan", ""), 0.0));
        let score = token_set_ratio("abc", "xyz");
        assert!(approx(score, 0.0), "score was {}", score);
    }

    #[test]
    fn test_token_set_partial_overlap() {
        // shared "juan"; "juan perez" vs "juan gomez"
        let score = token_set_ratio("juan perez", "juan gomez");
        let expected = edit_ratio("juan perez", "juan gomez")
            .max(edit_ratio("juan", "juan perez"))
            .max(edit_ratio("juan", "juan gomez"));
        assert!(approx(score, expected));
        assert!(score > 50.0 && score < 100.0, "score was {}", score);
    }

    #[test]
    fn test_combine_weights() {
        assert!(approx(combine(100.0, 50.0, 0.65), 82.5));
        assert!(approx(combine(100.0, 50.0, 1.0), 100.0));
        assert!(approx(combine(100.0, 50.0, 0.0), 50.0));
    }
}
