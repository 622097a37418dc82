/*!
 * Tests for hunk-level operation derivation: the canonical insert, merge
 * and move scenarios, the fatal cases, and the grouping machine's closure
 * over arbitrary pair sequences.
 */

use rand::Rng;

use stsync::errors::DeriveError;
use stsync::git::{Hunk, HunkLine, LineOrigin};
use stsync::hunk_operations::{ContentLine, PairKind, derive_hunk_operations, group_pair_kinds};
use stsync::operations::{OperationKind, OperationType};
use stsync::subtitle::Subtitle;

fn content_line(line_no: u32, content: &str, subtitle_ids: &[&str]) -> ContentLine {
    ContentLine {
        content: content.to_string(),
        line_no,
        subtitles: subtitle_ids
            .iter()
            .map(|id| Subtitle::new(*id, Some("rec-1".to_string())))
            .collect(),
    }
}

fn replace_hunk(deleted: &[(u32, &str)], added: &[&str]) -> Hunk {
    let mut lines = Vec::new();
    for (line_no, content) in deleted {
        lines.push(HunkLine::new(
            LineOrigin::Deletion,
            format!("{content}\n"),
            Some(*line_no),
        ));
    }
    for content in added {
        lines.push(HunkLine::new(
            LineOrigin::Addition,
            format!("{content}\n"),
            None,
        ));
    }
    Hunk::new(lines)
}

#[test]
fn test_derivation_withAddedMark_shouldYieldSingleInsert() {
    let lines = vec![content_line(1, "word1@word2", &["st-1"])];
    let hunk = replace_hunk(&[(1, "word1@word2")], &["word1@wordNew@word2"]);

    let ops = derive_hunk_operations(&lines, &hunk).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].operation_type(), OperationType::Insert);
    assert_eq!(ops[0].count_delta(), 1);
    assert_eq!(ops[0].affected_subtitles.len(), 1);
    // The new mark has no timing record yet, so its id is synthesized
    assert!(ops[0].affected_subtitles[0].persistent_id.starts_with("tmp-"));
}

#[test]
fn test_derivation_withAddedMarkAfterRealSubtitle_shouldAnchorOnIt() {
    let lines = vec![content_line(1, "@intro word1@word2", &["st-1", "st-2"])];
    let hunk = replace_hunk(&[(1, "@intro word1@word2")], &["@intro word1@wordNew@word2"]);

    let ops = derive_hunk_operations(&lines, &hunk).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(
        ops[0].kind,
        OperationKind::Insert {
            after_subtitle_id: "st-1".to_string()
        }
    );
}

#[test]
fn test_derivation_withRemovedMark_shouldYieldMergeOverBothSubtitles() {
    let lines = vec![content_line(
        1,
        "@sentence one. @Sentence two.",
        &["st-1", "st-2"],
    )];
    let hunk = replace_hunk(
        &[(1, "@sentence one. @Sentence two.")],
        &["@sentence one. Sentence two."],
    );

    let ops = derive_hunk_operations(&lines, &hunk).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].operation_type(), OperationType::Merge);
    assert_eq!(ops[0].count_delta(), -1);
    let ids: Vec<&str> = ops[0].affected_ids().collect();
    assert_eq!(ids, vec!["st-1", "st-2"]);
    assert!(ops[0].requires_review());
}

#[test]
fn test_derivation_withShiftedMark_shouldYieldMoveRight() {
    let lines = vec![content_line(1, "@The quick @fox", &["st-1", "st-2"])];
    let hunk = replace_hunk(&[(1, "@The quick @fox")], &["@The quick fox@"]);

    let ops = derive_hunk_operations(&lines, &hunk).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].operation_type(), OperationType::MoveRight);
    assert_eq!(ops[0].count_delta(), 0);
    let ids: Vec<&str> = ops[0].affected_ids().collect();
    assert_eq!(ids, vec!["st-1", "st-2"]);
}

#[test]
fn test_derivation_withLeadingInsert_shouldFailWithMissingAnchor() {
    let lines = vec![content_line(1, "@word", &["st-1"])];
    let hunk = replace_hunk(&[(1, "@word")], &["@new @word"]);

    let err = derive_hunk_operations(&lines, &hunk).unwrap_err();
    assert!(matches!(err, DeriveError::MissingAnchor { .. }));
}

#[test]
fn test_derivation_withAdditionOnlyHunk_shouldFailWithUnsupportedShape() {
    let hunk = Hunk::new(vec![HunkLine::new(
        LineOrigin::Addition,
        "@brand new line\n",
        None,
    )]);

    let err = derive_hunk_operations(&[], &hunk).unwrap_err();
    assert!(matches!(err, DeriveError::UnsupportedHunkShape { .. }));
}

#[test]
fn test_derivation_withMismatchedContentLines_shouldFailWithContentMismatch() {
    let lines = vec![content_line(1, "@something else", &["st-1"])];
    let hunk = replace_hunk(&[(1, "@word")], &["@word more"]);

    let err = derive_hunk_operations(&lines, &hunk).unwrap_err();
    assert!(matches!(err, DeriveError::ContentMismatch { .. }));
}

#[test]
fn test_grouping_withEmptySequence_shouldYieldNoGroups() {
    assert!(group_pair_kinds(&[]).unwrap().is_empty());
}

#[test]
fn test_grouping_withRandomSequences_shouldAlwaysReturnToIdle() {
    const KINDS: [PairKind; 6] = [
        PairKind::Identical,
        PairKind::LeftAligned,
        PairKind::RightAligned,
        PairKind::MarkAdded,
        PairKind::MarkRemoved,
        PairKind::Unaligned,
    ];

    let mut rng = rand::rng();
    for _ in 0..500 {
        let len = rng.random_range(0..16);
        let mut kinds: Vec<PairKind> = (0..len)
            .map(|_| KINDS[rng.random_range(0..KINDS.len())])
            .collect();
        kinds.push(PairKind::Identical);

        let groups = group_pair_kinds(&kinds)
            .unwrap_or_else(|e| panic!("machine stuck on {kinds:?}: {e}"));

        // Groups are non-empty, disjoint, ascending and in bounds
        let mut last_end = 0;
        for group in &groups {
            assert!(group.start >= last_end, "overlapping groups in {kinds:?}");
            assert!(group.end > group.start);
            assert!(group.end <= kinds.len());
            last_end = group.end;
        }
    }
}
