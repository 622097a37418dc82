/*!
 * Derives subtitle operations from one diff hunk.
 *
 * Pipeline: the hunk's lines are collapsed into per-origin groups and the
 * deleted/added contents are split into captions and aligned. Each aligned
 * pair is classified by its mark-count delta and similarity profile. A fast
 * path handles hunks that are nothing but isolated inserts or deletes;
 * everything else runs through a small grouping state machine that collapses
 * runs of non-trivial pairs into operations groups, from which the typed
 * operations are derived.
 *
 * Any hunk shape or grouping outcome not covered here surfaces as a named
 * `DeriveError` carrying the offending structure. The deriver never guesses.
 */

use std::collections::VecDeque;

use log::debug;

use crate::alignment::align_captions;
use crate::errors::DeriveError;
use crate::git::{Hunk, LineOrigin};
use crate::operations::{AffectedSubtitle, Operation, OperationKind};
use crate::similarity::{Anchor, score};
use crate::subtitle::{
    Caption, Subtitle, normalize_for_comparison, split_into_captions, strip_marks,
};

/// Classification of one aligned caption pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    /// Contents match absolutely
    Identical,
    /// Contents share their beginning
    LeftAligned,
    /// Contents share their end
    RightAligned,
    /// The added side has one more mark
    MarkAdded,
    /// The added side has one less mark
    MarkRemoved,
    /// No usable relation between the sides
    Unaligned,
}

/// One aligned caption pair with its classification and the subtitle it
/// consumed (or the temporary subtitle synthesized for it)
#[derive(Debug, Clone)]
pub struct AlignedPair {
    /// Classification driving grouping and operation derivation
    pub kind: PairKind,

    /// Subtitle consumed from the deleted side, or a temporary one
    pub subtitle: Subtitle,

    /// Left-anchored (similarity, confidence)
    pub sim_left: (f64, f64),

    /// Right-anchored (similarity, confidence)
    pub sim_right: (f64, f64),

    /// Absolute (similarity, confidence)
    pub sim_abs: (f64, f64),

    /// Normalized character length change, deleted to added
    pub content_length_delta: i64,

    /// Mark count change, deleted to added
    pub mark_count_delta: i64,

    /// Deleted-side caption, `None` for a gap
    pub deleted: Option<Caption>,

    /// Added-side caption, `None` for a gap
    pub added: Option<Caption>,
}

impl AlignedPair {
    fn describe(&self) -> String {
        format!(
            "{:?} del={:?} add={:?}",
            self.kind,
            self.deleted.as_ref().map(|c| c.text.as_str()),
            self.added.as_ref().map(|c| c.text.as_str())
        )
    }
}

/// One line of the from-version content covered by a hunk, with the
/// subtitles whose marks sit on that line, in document order
#[derive(Debug, Clone)]
pub struct ContentLine {
    /// Line content without trailing newline
    pub content: String,

    /// 1-based line number in the from-version
    pub line_no: u32,

    /// Subtitles on this line, in document order
    pub subtitles: Vec<Subtitle>,
}

/// Derive the operations for one hunk. `content_lines` are the from-version
/// lines the hunk deletes, with their subtitles.
pub fn derive_hunk_operations(
    content_lines: &[ContentLine],
    hunk: &Hunk,
) -> Result<Vec<Operation>, DeriveError> {
    let groups = per_origin_line_groups(hunk);
    let signature: Vec<LineOrigin> = groups.iter().map(|g| g.origin).collect();

    match signature.as_slice() {
        [LineOrigin::Deletion, LineOrigin::Addition] => {
            derive_for_deletion_addition(content_lines, &groups[0], &groups[1])
        }
        // Pure additions, pure deletions and eof-newline shapes are not
        // derivable; the caller decides whether to skip or fail the batch.
        _ => Err(DeriveError::UnsupportedHunkShape {
            signature,
            details: hunk_summary(hunk),
        }),
    }
}

/// Consecutive same-origin hunk lines concatenated into one group
#[derive(Debug, Clone)]
struct OriginLineGroup {
    origin: LineOrigin,
    content: String,
    old_line_nos: Vec<u32>,
}

fn per_origin_line_groups(hunk: &Hunk) -> Vec<OriginLineGroup> {
    let mut groups: Vec<OriginLineGroup> = Vec::new();
    for line in &hunk.lines {
        match groups.last_mut() {
            Some(group) if group.origin == line.origin => {
                group.content.push_str(&line.content);
                if let Some(line_no) = line.old_line_no {
                    group.old_line_nos.push(line_no);
                }
            }
            _ => groups.push(OriginLineGroup {
                origin: line.origin,
                content: line.content.clone(),
                old_line_nos: line.old_line_no.into_iter().collect(),
            }),
        }
    }
    groups
}

fn hunk_summary(hunk: &Hunk) -> String {
    hunk.lines
        .iter()
        .map(|l| format!("{:?}:{:?}", l.origin, l.content))
        .collect::<Vec<_>>()
        .join(", ")
}

fn derive_for_deletion_addition(
    content_lines: &[ContentLine],
    deleted_group: &OriginLineGroup,
    added_group: &OriginLineGroup,
) -> Result<Vec<Operation>, DeriveError> {
    let mut original_content = content_lines
        .iter()
        .map(|l| l.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    original_content.push('\n');
    if original_content != deleted_group.content {
        return Err(DeriveError::ContentMismatch {
            expected: deleted_group.content.clone(),
            actual: original_content,
        });
    }

    let hunk_subtitles: Vec<Subtitle> = content_lines
        .iter()
        .flat_map(|l| l.subtitles.iter().cloned())
        .collect();

    let deleted_captions = split_into_captions(&deleted_group.content);
    let added_captions = split_into_captions(&added_group.content);
    let (aligned_deleted, aligned_added) = align_captions(&deleted_captions, &added_captions);

    let pairs = build_aligned_pairs(&aligned_deleted, &aligned_added, hunk_subtitles)?;

    // Fast path for hunks that are nothing but isolated inserts or deletes
    let pure_ops = detect_pure_insertions_or_deletions(&pairs)?;
    if !pure_ops.is_empty() {
        debug!("hunk resolved on the fast path with {} operation(s)", pure_ops.len());
        return Ok(pure_ops);
    }

    let kinds: Vec<PairKind> = pairs.iter().map(|p| p.kind).collect();
    let groups = group_pair_kinds(&kinds)?;
    let operations = compute_operations(&pairs, &groups)?;
    debug!(
        "hunk produced {} operations group(s), {} operation(s)",
        groups.len(),
        operations.len()
    );
    Ok(operations)
}

fn build_aligned_pairs(
    aligned_deleted: &[Option<Caption>],
    aligned_added: &[Option<Caption>],
    hunk_subtitles: Vec<Subtitle>,
) -> Result<Vec<AlignedPair>, DeriveError> {
    let mut remaining: VecDeque<Subtitle> = hunk_subtitles.into();
    let mut pairs = Vec::with_capacity(aligned_deleted.len());
    let mut most_recent_id: Option<String> = None;
    let mut temp_offset = 0usize;

    for (deleted, added) in aligned_deleted.iter().zip(aligned_added.iter()) {
        let deleted_text = deleted.as_ref().map(|c| c.text.as_str()).unwrap_or("");
        let added_text = added.as_ref().map(|c| c.text.as_str()).unwrap_or("");
        let deleted_marks = deleted.as_ref().map(|c| c.mark_count).unwrap_or(0);
        let added_marks = added.as_ref().map(|c| c.mark_count).unwrap_or(0);

        let mut subtitle = match deleted_marks {
            0 => {
                // No mark consumed; synthesize an id anchored on the most
                // recent real subtitle
                temp_offset += 1;
                Subtitle::temporary(most_recent_id.as_deref(), temp_offset)
            }
            1 => {
                let subtitle = remaining.pop_front().ok_or_else(|| {
                    DeriveError::SubtitleInventoryExhausted {
                        details: deleted_text.to_string(),
                    }
                })?;
                temp_offset = 0;
                most_recent_id = Some(subtitle.persistent_id.clone());
                subtitle
            }
            _ => {
                return Err(DeriveError::MalformedCaption {
                    text: deleted_text.to_string(),
                });
            }
        };
        subtitle.tmp_attrs.before = Some(strip_marks(deleted_text));
        subtitle.tmp_attrs.after = Some(strip_marks(added_text));

        let deleted_norm = normalize_for_comparison(deleted_text);
        let added_norm = normalize_for_comparison(added_text);
        let sim_left = score(&deleted_norm, &added_norm, Anchor::Left);
        let sim_right = score(&deleted_norm, &added_norm, Anchor::Right);
        let sim_abs = score(&deleted_norm, &added_norm, Anchor::None);
        let content_length_delta =
            added_norm.chars().count() as i64 - deleted_norm.chars().count() as i64;
        let mark_count_delta = added_marks as i64 - deleted_marks as i64;
        let kind = classify_pair(mark_count_delta, sim_abs, sim_left, sim_right);

        pairs.push(AlignedPair {
            kind,
            subtitle,
            sim_left,
            sim_right,
            sim_abs,
            content_length_delta,
            mark_count_delta,
            deleted: deleted.clone(),
            added: added.clone(),
        });
    }
    Ok(pairs)
}

/// Mark-count deltas take precedence over similarity; similarity checks run
/// in identical -> left -> right order, each gated on both score and
/// confidence exceeding 0.9
fn classify_pair(
    mark_count_delta: i64,
    sim_abs: (f64, f64),
    sim_left: (f64, f64),
    sim_right: (f64, f64),
) -> PairKind {
    if mark_count_delta == 1 {
        PairKind::MarkAdded
    } else if mark_count_delta == -1 {
        PairKind::MarkRemoved
    } else if sim_abs.0 > 0.9 && sim_abs.1 > 0.9 {
        PairKind::Identical
    } else if sim_left.0 > 0.9 && sim_left.1 > 0.9 {
        PairKind::LeftAligned
    } else if sim_right.0 > 0.9 && sim_right.1 > 0.9 {
        PairKind::RightAligned
    } else {
        PairKind::Unaligned
    }
}

/// If every pair is mark-added/identical (or mark-removed/identical), the
/// hunk is a run of isolated inserts (or deletes) and the grouping machine
/// is unnecessary. Returns an empty vec when the fast path does not apply.
fn detect_pure_insertions_or_deletions(
    pairs: &[AlignedPair],
) -> Result<Vec<Operation>, DeriveError> {
    let all_inserts = pairs
        .iter()
        .all(|p| matches!(p.kind, PairKind::MarkAdded | PairKind::Identical));
    let all_deletes = pairs
        .iter()
        .all(|p| matches!(p.kind, PairKind::MarkRemoved | PairKind::Identical));
    if !all_inserts && !all_deletes {
        return Ok(Vec::new());
    }

    let mut operations = Vec::new();
    let mut previous: Option<&Subtitle> = None;
    for pair in pairs {
        match pair.kind {
            PairKind::MarkAdded => {
                let anchor = previous.ok_or_else(|| DeriveError::MissingAnchor {
                    operation: "insert",
                    details: pair.describe(),
                })?;
                operations.push(Operation::new(
                    OperationKind::Insert {
                        after_subtitle_id: anchor.persistent_id.clone(),
                    },
                    vec![AffectedSubtitle::from(&pair.subtitle)],
                ));
            }
            PairKind::MarkRemoved => {
                let anchor = previous.ok_or_else(|| DeriveError::MissingAnchor {
                    operation: "delete",
                    details: pair.describe(),
                })?;
                operations.push(Operation::new(
                    OperationKind::Delete {
                        after_subtitle_id: anchor.persistent_id.clone(),
                    },
                    vec![AffectedSubtitle::from(&pair.subtitle)],
                ));
            }
            _ => {}
        }
        previous = Some(&pair.subtitle);
    }
    Ok(operations)
}

/// Grouping machine state. `GroupFound` and `NoOperation` are resolved
/// within the same fold step by the auto-reset transition, so between steps
/// the machine is only ever `Idle` or `GroupActive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupingState {
    Idle,
    GroupActive,
    GroupFound,
    NoOperation,
}

fn transition(state: GroupingState, kind: PairKind) -> Result<GroupingState, DeriveError> {
    use GroupingState::*;
    match (state, kind) {
        (Idle, PairKind::Identical) => Ok(NoOperation),
        (Idle, PairKind::LeftAligned) => Ok(GroupActive),
        (Idle | GroupActive, PairKind::RightAligned) => Ok(GroupFound),
        (Idle | GroupActive, PairKind::MarkAdded) => Ok(GroupActive),
        (Idle | GroupActive, PairKind::MarkRemoved) => Ok(GroupActive),
        (Idle | GroupActive, PairKind::Unaligned) => Ok(GroupActive),
        (state, kind) => Err(DeriveError::InvalidGroupTransition {
            state: format!("{state:?}"),
            event: format!("{kind:?}"),
        }),
    }
}

/// Fold the pair kinds into operations groups, returned as contiguous index
/// ranges. An active group is force-closed when the next pair is absent,
/// identical or left-aligned (a left-aligned pair only donates context to
/// the group it opens, never extends one). The machine must be idle at the
/// end of input; anything else means the hunk is malformed.
pub fn group_pair_kinds(kinds: &[PairKind]) -> Result<Vec<std::ops::Range<usize>>, DeriveError> {
    let mut state = GroupingState::Idle;
    let mut groups = Vec::new();
    let mut group_start = 0usize;

    for (idx, kind) in kinds.iter().enumerate() {
        if state == GroupingState::Idle {
            group_start = idx;
        }
        state = transition(state, *kind)?;

        let next_closes = kinds
            .get(idx + 1)
            .is_none_or(|k| matches!(k, PairKind::Identical | PairKind::LeftAligned));
        if state == GroupingState::GroupActive && next_closes {
            state = GroupingState::GroupFound;
        }

        // Auto-reset: terminal states resolve within the same step
        match state {
            GroupingState::NoOperation => state = GroupingState::Idle,
            GroupingState::GroupFound => {
                groups.push(group_start..idx + 1);
                state = GroupingState::Idle;
            }
            _ => {}
        }
    }

    if state != GroupingState::Idle {
        return Err(DeriveError::IncompleteGrouping {
            state: format!("{state:?}"),
        });
    }
    Ok(groups)
}

fn describe_group(group: &[AlignedPair]) -> String {
    group
        .iter()
        .map(AlignedPair::describe)
        .collect::<Vec<_>>()
        .join("; ")
}

fn affected_subtitles(group: &[AlignedPair]) -> Vec<AffectedSubtitle> {
    group
        .iter()
        .map(|p| AffectedSubtitle::from(&p.subtitle))
        .collect()
}

fn compute_operations(
    pairs: &[AlignedPair],
    groups: &[std::ops::Range<usize>],
) -> Result<Vec<Operation>, DeriveError> {
    let mut operations = Vec::new();
    let mut previous_subtitle: Option<&Subtitle> = None;

    for range in groups {
        let group = &pairs[range.clone()];
        match group.len() {
            0 => {
                return Err(DeriveError::UnhandledGroup {
                    details: "empty operations group".to_string(),
                });
            }
            1 => {
                let pair = &group[0];
                match pair.kind {
                    // A lone aligned or unaligned pair is a pure content
                    // change; not tracked as an operation
                    PairKind::LeftAligned | PairKind::RightAligned | PairKind::Unaligned => {}
                    PairKind::MarkAdded => {
                        let anchor =
                            previous_subtitle.ok_or_else(|| DeriveError::MissingAnchor {
                                operation: "insert",
                                details: pair.describe(),
                            })?;
                        operations.push(Operation::new(
                            OperationKind::Insert {
                                after_subtitle_id: anchor.persistent_id.clone(),
                            },
                            affected_subtitles(group),
                        ));
                    }
                    PairKind::MarkRemoved => {
                        let anchor =
                            previous_subtitle.ok_or_else(|| DeriveError::MissingAnchor {
                                operation: "delete",
                                details: pair.describe(),
                            })?;
                        operations.push(Operation::new(
                            OperationKind::Delete {
                                after_subtitle_id: anchor.persistent_id.clone(),
                            },
                            affected_subtitles(group),
                        ));
                    }
                    PairKind::Identical => {
                        return Err(DeriveError::UnhandledGroup {
                            details: describe_group(group),
                        });
                    }
                }
            }
            2 => {
                let added = group.iter().filter(|p| p.kind == PairKind::MarkAdded).count();
                let removed = group
                    .iter()
                    .filter(|p| p.kind == PairKind::MarkRemoved)
                    .count();
                match added + removed {
                    0 => {
                        // No mark deltas: a move. The first pair shrinking
                        // means the boundary moved left.
                        let kind = if group[0].content_length_delta < 0 {
                            OperationKind::MoveLeft
                        } else {
                            OperationKind::MoveRight
                        };
                        operations.push(Operation::new(kind, affected_subtitles(group)));
                    }
                    1 => {
                        let kind = if added == 1 {
                            OperationKind::Split
                        } else {
                            OperationKind::Merge
                        };
                        operations.push(Operation::new(kind, affected_subtitles(group)));
                    }
                    2 => {
                        return Err(DeriveError::UnhandledGroup {
                            details: format!(
                                "insert/delete pair not caught by the fast path: {}",
                                describe_group(group)
                            ),
                        });
                    }
                    _ => {
                        return Err(DeriveError::UnhandledGroup {
                            details: describe_group(group),
                        });
                    }
                }
            }
            _ => operations.extend(compute_operations_for_group(group)?),
        }
        previous_subtitle = group.last().map(|p| &p.subtitle);
    }
    Ok(operations)
}

/// Groups of three or more pairs: walk the pairs tracking the cumulative
/// content length delta. Mark deltas become splits/merges keyed to their
/// immediate neighbor; re-stabilizing pairs become moves directed by the
/// sign of the cumulative delta at that point.
fn compute_operations_for_group(group: &[AlignedPair]) -> Result<Vec<Operation>, DeriveError> {
    let mut operations = Vec::new();
    let mut cumulative_delta: i64 = 0;

    for (idx, pair) in group.iter().enumerate() {
        let neighborhood: Vec<AffectedSubtitle> = group[idx.saturating_sub(1)..=idx]
            .iter()
            .map(|p| AffectedSubtitle::from(&p.subtitle))
            .collect();

        match pair.kind {
            // Donates its subtitle as context to the next operation only
            PairKind::LeftAligned => {}
            PairKind::RightAligned | PairKind::Unaligned => {
                let kind = if cumulative_delta < 0 {
                    OperationKind::MoveLeft
                } else {
                    OperationKind::MoveRight
                };
                operations.push(Operation::new(kind, neighborhood));
            }
            PairKind::MarkAdded => {
                operations.push(Operation::new(OperationKind::Split, neighborhood));
            }
            PairKind::MarkRemoved => {
                operations.push(Operation::new(OperationKind::Merge, neighborhood));
            }
            PairKind::Identical => {
                return Err(DeriveError::UnhandledGroup {
                    details: describe_group(group),
                });
            }
        }
        cumulative_delta += pair.content_length_delta;
    }
    Ok(operations)
}
