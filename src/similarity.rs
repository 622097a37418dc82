/*!
 * Token-overlap similarity scoring with directional anchoring.
 *
 * Compares two normalized caption strings and returns a
 * `(similarity, confidence)` pair, both in `[0, 1]`. Left/right anchoring
 * restricts the comparison to a prefix/suffix window sized by the shorter
 * string, which is how the caption classifier tells "same start, different
 * end" from "different start, same end".
 *
 * The scores are a heuristic acceptance test. Only the 0.9/0.9 threshold
 * behavior downstream needs to be exact; the confidence curve itself is
 * tunable.
 */

use std::collections::BTreeSet;

/// Anchoring mode for a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Compare full strings
    None,
    /// Compare prefix windows sized by the shorter string
    Left,
    /// Compare suffix windows sized by the shorter string
    Right,
}

/// Score two pre-normalized strings (marks stripped, case-folded).
///
/// Returns `(similarity, confidence)`. Identical inputs score `(1.0, 1.0)`.
/// Similarity is the Jaccard overlap of the (windowed) token sets;
/// confidence is the ratio of the smaller to the larger token count, so it
/// degrades symmetrically with length disparity. If either side tokenizes
/// to nothing the comparison is meaningless and scores `(0.0, 0.0)`.
pub fn score(a: &str, b: &str, anchor: Anchor) -> (f64, f64) {
    if a == b {
        return (1.0, 1.0);
    }

    let (wa, wb) = match anchor {
        Anchor::None => (a, b),
        Anchor::Left => {
            let window = a.chars().count().min(b.chars().count());
            (prefix_chars(a, window), prefix_chars(b, window))
        }
        Anchor::Right => {
            let window = a.chars().count().min(b.chars().count());
            (suffix_chars(a, window), suffix_chars(b, window))
        }
    };

    let tokens_a: BTreeSet<&str> = wa.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = wb.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return (0.0, 0.0);
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    let similarity = intersection as f64 / union as f64;

    let min_count = tokens_a.len().min(tokens_b.len());
    let max_count = tokens_a.len().max(tokens_b.len());
    let confidence = min_count as f64 / max_count as f64;

    (similarity, confidence)
}

/// First `n` characters of a string, char-boundary safe
fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Last `n` characters of a string, char-boundary safe
fn suffix_chars(s: &str, n: usize) -> &str {
    let char_count = s.chars().count();
    if char_count <= n {
        return s;
    }
    match s.char_indices().nth(char_count - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
