/*!
 * Global caption alignment.
 *
 * Aligns the deleted-side caption sequence of a hunk with the added-side
 * sequence, inserting explicit gaps where the counts differ. This is a
 * Needleman-Wunsch style global alignment over whole captions, scored with
 * the similarity module, so the place where a mark was added or removed is
 * localized instead of smeared by a naive 1:1 zip.
 */

use crate::similarity::{Anchor, score};
use crate::subtitle::{Caption, normalize_for_comparison};

/// Score for pairing a deleted caption with an added caption. Absolute
/// similarity dominates; a shared prefix or suffix earns partial credit so
/// captions that merely grew or shrank still pair up with their origin.
fn pair_score(deleted: &Caption, added: &Caption) -> i64 {
    let del_norm = normalize_for_comparison(&deleted.text);
    let add_norm = normalize_for_comparison(&added.text);
    let (abs_sim, _) = score(&del_norm, &add_norm, Anchor::None);
    let (left_sim, _) = score(&del_norm, &add_norm, Anchor::Left);
    let (right_sim, _) = score(&del_norm, &add_norm, Anchor::Right);
    (100.0 * abs_sim + 40.0 * left_sim.max(right_sim)) as i64
}

const GAP_PENALTY: i64 = -10;

/// Align two caption sequences into equal-length sequences with explicit
/// gaps (`None`). Concatenating the `Some` captions on either side
/// reproduces that side's input order exactly.
pub fn align_captions(
    deleted: &[Caption],
    added: &[Caption],
) -> (Vec<Option<Caption>>, Vec<Option<Caption>>) {
    let n = deleted.len();
    let m = added.len();

    // dp[i][j] = best score aligning deleted[..i] with added[..j]
    let mut dp = vec![vec![0i64; m + 1]; n + 1];
    for i in 1..=n {
        dp[i][0] = i as i64 * GAP_PENALTY;
    }
    for j in 1..=m {
        dp[0][j] = j as i64 * GAP_PENALTY;
    }
    for i in 1..=n {
        for j in 1..=m {
            let pair = dp[i - 1][j - 1] + pair_score(&deleted[i - 1], &added[j - 1]);
            let del_gap = dp[i - 1][j] + GAP_PENALTY;
            let add_gap = dp[i][j - 1] + GAP_PENALTY;
            dp[i][j] = pair.max(del_gap).max(add_gap);
        }
    }

    // Traceback, preferring pairing over gaps for determinism
    let mut aligned_deleted = Vec::new();
    let mut aligned_added = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0
            && j > 0
            && dp[i][j] == dp[i - 1][j - 1] + pair_score(&deleted[i - 1], &added[j - 1])
        {
            aligned_deleted.push(Some(deleted[i - 1].clone()));
            aligned_added.push(Some(added[j - 1].clone()));
            i -= 1;
            j -= 1;
        } else if i > 0 && dp[i][j] == dp[i - 1][j] + GAP_PENALTY {
            aligned_deleted.push(Some(deleted[i - 1].clone()));
            aligned_added.push(None);
            i -= 1;
        } else {
            aligned_deleted.push(None);
            aligned_added.push(Some(added[j - 1].clone()));
            j -= 1;
        }
    }
    aligned_deleted.reverse();
    aligned_added.reverse();

    (aligned_deleted, aligned_added)
}
