/*!
 * Subtitle and caption data model.
 *
 * Subtitle marks are inline, zero-width `@` characters embedded in content
 * text. A caption is the run of text between two consecutive marks. This
 * module owns the mark/caption primitives everything else builds on:
 * splitting a line into captions, stripping and normalizing marks, and the
 * per-caption character lengths recomputed at sync time.
 */

use std::fmt;

/// The inline subtitle mark character
pub const SUBTITLE_MARK: char = '@';

/// Prefix used for subtitle ids synthesized mid-computation
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Transient before/after context attached to a subtitle during operation
/// derivation. Mark-stripped text; discarded after the operation set is
/// assembled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TmpAttrs {
    /// Caption text on the deleted side
    pub before: Option<String>,

    /// Caption text on the added side
    pub after: Option<String>,
}

/// One subtitle mark instance
#[derive(Debug, Clone, PartialEq)]
pub struct Subtitle {
    /// Stable identity surviving merges and splits. Temporary ids of the
    /// form `tmp-<anchor>+<n>` are synthesized for marks created
    /// mid-computation; permanent ids are assigned downstream.
    pub persistent_id: String,

    /// Grouping unit, e.g. the paragraph or record the mark sits in
    pub record_id: Option<String>,

    /// Caption length in characters, recomputed at sync time
    pub char_length: Option<usize>,

    /// Transient derivation context
    pub tmp_attrs: TmpAttrs,
}

impl Subtitle {
    /// Create a subtitle with a known persistent id
    pub fn new(persistent_id: impl Into<String>, record_id: Option<String>) -> Self {
        Subtitle {
            persistent_id: persistent_id.into(),
            record_id,
            char_length: None,
            tmp_attrs: TmpAttrs::default(),
        }
    }

    /// Create a temporary subtitle for a mark that has no marker record yet.
    /// `anchor` is the most recent real persistent id seen before this mark,
    /// or `None` at the very start of a hunk.
    pub fn temporary(anchor: Option<&str>, offset: usize) -> Self {
        let persistent_id = format!(
            "{}{}+{}",
            TEMP_ID_PREFIX,
            anchor.unwrap_or("hunk_start"),
            offset
        );
        Subtitle::new(persistent_id, None)
    }

    /// Whether this subtitle still carries a synthesized id
    pub fn is_temporary(&self) -> bool {
        self.persistent_id.starts_with(TEMP_ID_PREFIX)
    }
}

impl fmt::Display for Subtitle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.persistent_id)
    }
}

/// A run of text between consecutive subtitle marks. Transient; produced by
/// `split_into_captions` and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    /// Caption text, including its leading mark if it has one
    pub text: String,

    /// Text length in characters
    pub length: usize,

    /// Number of marks in the caption, 0 or 1 by construction
    pub mark_count: usize,
}

impl Caption {
    /// Build a caption from raw text, computing length and mark count
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let length = text.chars().count();
        let mark_count = count_marks(&text);
        Caption {
            text,
            length,
            mark_count,
        }
    }
}

/// Count subtitle marks in a piece of text
pub fn count_marks(text: &str) -> usize {
    text.chars().filter(|c| *c == SUBTITLE_MARK).count()
}

/// Split a line into captions: maximal runs of text between consecutive
/// marks. Each caption except possibly the first begins with a mark, and
/// concatenating the captions reproduces the input exactly. Zero-mark input
/// yields a single caption; empty input yields no captions.
pub fn split_into_captions(line: &str) -> Vec<Caption> {
    if line.is_empty() {
        return Vec::new();
    }

    let mut boundaries: Vec<usize> = line
        .match_indices(SUBTITLE_MARK)
        .map(|(idx, _)| idx)
        .filter(|idx| *idx > 0)
        .collect();
    boundaries.push(line.len());

    let mut captions = Vec::with_capacity(boundaries.len());
    let mut start = 0;
    for boundary in boundaries {
        if boundary > start {
            captions.push(Caption::new(&line[start..boundary]));
            start = boundary;
        }
    }
    captions
}

/// Remove all marks from a piece of text
pub fn strip_marks(text: &str) -> String {
    text.chars().filter(|c| *c != SUBTITLE_MARK).collect()
}

/// Normalize text for similarity comparison and length deltas: marks become
/// spaces, everything is lowercased
pub fn normalize_for_comparison(text: &str) -> String {
    text.chars()
        .map(|c| if c == SUBTITLE_MARK { ' ' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// Character length of each caption in a full content file, one entry per
/// mark in document order. The mark itself is not counted.
pub fn caption_char_lengths(content: &str) -> Vec<usize> {
    let mut lengths = Vec::new();
    let mut current: Option<usize> = None;
    for c in content.chars() {
        if c == SUBTITLE_MARK {
            if let Some(len) = current.take() {
                lengths.push(len);
            }
            current = Some(0);
        } else if let Some(len) = current.as_mut() {
            *len += 1;
        }
    }
    if let Some(len) = current {
        lengths.push(len);
    }
    lengths
}
