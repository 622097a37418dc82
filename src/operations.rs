/*!
 * Subtitle operations and operation sets.
 *
 * An `Operation` is the persisted unit of change derived from one edit:
 * insert, delete, merge, split, move left/right or content change, with the
 * subtitles it affects copied in by value. Operations for one file over one
 * commit range are collected into an `OperationsForFile`; those roll up into
 * an `OperationsForRepository`, which can be cached to disk keyed by its
 * commit range because derivation is expensive and deterministic.
 */

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::marker_csv::SubtitleRecord;
use crate::subtitle::Subtitle;

/// The type tag of an operation, used where operations are referenced by
/// kind only (e.g. review-flag maps)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Insert,
    Delete,
    Merge,
    Split,
    MoveLeft,
    MoveRight,
    ContentChange,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            OperationType::Insert => "insert",
            OperationType::Delete => "delete",
            OperationType::Merge => "merge",
            OperationType::Split => "split",
            OperationType::MoveLeft => "move_left",
            OperationType::MoveRight => "move_right",
            OperationType::ContentChange => "content_change",
        };
        write!(f, "{name}")
    }
}

/// A subtitle copied by value into an operation, with the transient
/// before/after caption context captured at derivation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedSubtitle {
    /// Persistent (possibly temporary) subtitle id
    pub persistent_id: String,

    /// Mark-stripped caption text on the deleted side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,

    /// Mark-stripped caption text on the added side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl From<&Subtitle> for AffectedSubtitle {
    fn from(subtitle: &Subtitle) -> Self {
        AffectedSubtitle {
            persistent_id: subtitle.persistent_id.clone(),
            before: subtitle.tmp_attrs.before.clone(),
            after: subtitle.tmp_attrs.after.clone(),
        }
    }
}

/// Operation kind, one variant per operation type. Insert and delete carry
/// the anchor subtitle preceding them; the other kinds are positioned by
/// their affected subtitles alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation_type", rename_all = "snake_case")]
pub enum OperationKind {
    Insert {
        /// Id of the subtitle immediately preceding the insertion
        after_subtitle_id: String,
    },
    Delete {
        /// Id of the subtitle immediately preceding the deletion
        after_subtitle_id: String,
    },
    Merge,
    Split,
    MoveLeft,
    MoveRight,
    ContentChange,
}

/// One derived subtitle operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Assigned by downstream id generation; empty during derivation
    #[serde(default)]
    pub operation_id: String,

    /// Affected subtitles in document order; non-empty, ids unique
    pub affected_subtitles: Vec<AffectedSubtitle>,

    /// Kind tag plus kind-specific fields
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl Operation {
    /// Create an operation with an empty operation id
    pub fn new(kind: OperationKind, affected_subtitles: Vec<AffectedSubtitle>) -> Self {
        Operation {
            operation_id: String::new(),
            affected_subtitles,
            kind,
        }
    }

    /// Type tag for this operation
    pub fn operation_type(&self) -> OperationType {
        match self.kind {
            OperationKind::Insert { .. } => OperationType::Insert,
            OperationKind::Delete { .. } => OperationType::Delete,
            OperationKind::Merge => OperationType::Merge,
            OperationKind::Split => OperationType::Split,
            OperationKind::MoveLeft => OperationType::MoveLeft,
            OperationKind::MoveRight => OperationType::MoveRight,
            OperationKind::ContentChange => OperationType::ContentChange,
        }
    }

    /// Net effect of this operation on the subtitle count
    pub fn count_delta(&self) -> i64 {
        match self.kind {
            OperationKind::Insert { .. } | OperationKind::Split => 1,
            OperationKind::Delete { .. } | OperationKind::Merge => -1,
            OperationKind::MoveLeft | OperationKind::MoveRight | OperationKind::ContentChange => 0,
        }
    }

    /// Whether the affected subtitles need human review after a foreign
    /// transfer. True exactly for the kinds whose placement the heuristic
    /// aligner cannot fully guarantee.
    pub fn requires_review(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::Merge
                | OperationKind::Split
                | OperationKind::MoveLeft
                | OperationKind::MoveRight
        )
    }

    /// Ids of the affected subtitles, in document order
    pub fn affected_ids(&self) -> impl Iterator<Item = &str> {
        self.affected_subtitles
            .iter()
            .map(|s| s.persistent_id.as_str())
    }

    /// Structural checks: affected subtitles non-empty and unique, anchors
    /// non-empty where required
    pub fn validate(&self) -> Result<()> {
        if self.affected_subtitles.is_empty() {
            return Err(anyhow!(
                "{} operation affects no subtitles",
                self.operation_type()
            ));
        }
        for (idx, subtitle) in self.affected_subtitles.iter().enumerate() {
            if self.affected_subtitles[..idx]
                .iter()
                .any(|other| other.persistent_id == subtitle.persistent_id)
            {
                return Err(anyhow!(
                    "{} operation affects subtitle {} twice",
                    self.operation_type(),
                    subtitle.persistent_id
                ));
            }
        }
        match &self.kind {
            OperationKind::Insert { after_subtitle_id }
            | OperationKind::Delete { after_subtitle_id } => {
                if after_subtitle_id.is_empty() {
                    return Err(anyhow!(
                        "{} operation has an empty anchor subtitle id",
                        self.operation_type()
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// All operations derived for one file over one commit range. Immutable
/// after creation; application order equals document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationsForFile {
    /// Identity shared by a primary file, its marker file and its foreign
    /// counterparts
    pub product_identity_id: String,

    /// Start of the commit range, exclusive
    pub from_commit: String,

    /// End of the commit range, inclusive
    pub to_commit: String,

    /// Operations in document order
    pub operations: Vec<Operation>,
}

impl OperationsForFile {
    /// Assemble the operation set for one file
    pub fn new(
        product_identity_id: impl Into<String>,
        from_commit: impl Into<String>,
        to_commit: impl Into<String>,
        operations: Vec<Operation>,
    ) -> Self {
        OperationsForFile {
            product_identity_id: product_identity_id.into(),
            from_commit: from_commit.into(),
            to_commit: to_commit.into(),
            operations,
        }
    }

    /// Whether no operations were derived
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Net subtitle count change across all operations
    pub fn subtitles_count_delta(&self) -> i64 {
        self.operations.iter().map(Operation::count_delta).sum()
    }

    /// Subtitles flagged for review, keyed by id, with the operation type
    /// that touched them. Later operations win on overlap.
    pub fn subtitles_requiring_review(&self) -> BTreeMap<String, OperationType> {
        let mut flagged = BTreeMap::new();
        for operation in &self.operations {
            if !operation.requires_review() {
                continue;
            }
            for id in operation.affected_ids() {
                flagged.insert(id.to_string(), operation.operation_type());
            }
        }
        flagged
    }

    /// Replay this operation set over an ordered subtitle record list.
    /// Inserts and splits add a row after their anchor, deletes and merges
    /// remove rows; moves and content changes leave the rows alone. Timing
    /// fields of new rows are placeholders until new time slices are merged.
    pub fn apply_to_subtitles(&self, records: &[SubtitleRecord]) -> Result<Vec<SubtitleRecord>> {
        let mut result: Vec<SubtitleRecord> = records.to_vec();
        for operation in &self.operations {
            match &operation.kind {
                OperationKind::Insert { after_subtitle_id } => {
                    let anchor = position_of(&result, after_subtitle_id).with_context(|| {
                        format!("insert anchor {after_subtitle_id} not found")
                    })?;
                    let record_id = result[anchor].record_id.clone();
                    for (offset, subtitle) in operation.affected_subtitles.iter().enumerate() {
                        result.insert(
                            anchor + 1 + offset,
                            SubtitleRecord::placeholder(&subtitle.persistent_id, record_id.clone()),
                        );
                    }
                }
                OperationKind::Delete { .. } => {
                    for subtitle in &operation.affected_subtitles {
                        let pos = position_of(&result, &subtitle.persistent_id).with_context(
                            || format!("deleted subtitle {} not found", subtitle.persistent_id),
                        )?;
                        result.remove(pos);
                    }
                }
                OperationKind::Split => {
                    // The existing subtitle keeps its row; every affected id
                    // not present yet is a new row inserted after it.
                    let anchor = operation
                        .affected_subtitles
                        .iter()
                        .filter_map(|s| position_of(&result, &s.persistent_id))
                        .next()
                        .ok_or_else(|| anyhow!("split has no existing subtitle to anchor on"))?;
                    let record_id = result[anchor].record_id.clone();
                    let mut insert_at = anchor + 1;
                    for subtitle in &operation.affected_subtitles {
                        if position_of(&result, &subtitle.persistent_id).is_some() {
                            continue;
                        }
                        result.insert(
                            insert_at,
                            SubtitleRecord::placeholder(&subtitle.persistent_id, record_id.clone()),
                        );
                        insert_at += 1;
                    }
                }
                OperationKind::Merge => {
                    // First affected subtitle survives; the rest disappear
                    for subtitle in operation.affected_subtitles.iter().skip(1) {
                        let pos = position_of(&result, &subtitle.persistent_id).with_context(
                            || format!("merged subtitle {} not found", subtitle.persistent_id),
                        )?;
                        result.remove(pos);
                    }
                }
                OperationKind::MoveLeft
                | OperationKind::MoveRight
                | OperationKind::ContentChange => {}
            }
        }
        Ok(result)
    }
}

fn position_of(records: &[SubtitleRecord], persistent_id: &str) -> Option<usize> {
    records.iter().position(|r| r.persistent_id == persistent_id)
}

/// All per-file operation sets for one repository over one commit range,
/// excluding files with zero operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationsForRepository {
    /// Repository the operations were derived in
    pub repository_name: String,

    /// Start of the commit range, exclusive
    pub from_commit: String,

    /// End of the commit range, inclusive
    pub to_commit: String,

    /// Per-file operation sets, in changed-file order
    pub files: Vec<OperationsForFile>,
}

impl OperationsForRepository {
    /// Assemble the repository-level operation set
    pub fn new(
        repository_name: impl Into<String>,
        from_commit: impl Into<String>,
        to_commit: impl Into<String>,
        files: Vec<OperationsForFile>,
    ) -> Self {
        OperationsForRepository {
            repository_name: repository_name.into(),
            from_commit: from_commit.into(),
            to_commit: to_commit.into(),
            files,
        }
    }

    /// Operation set for one product identity, if the file had any
    pub fn operations_for_product(&self, product_identity_id: &str) -> Option<&OperationsForFile> {
        self.files
            .iter()
            .find(|f| f.product_identity_id == product_identity_id)
    }

    /// Product identities of all affected files
    pub fn affected_product_identity_ids(&self) -> Vec<&str> {
        self.files
            .iter()
            .map(|f| f.product_identity_id.as_str())
            .collect()
    }

    /// Cache file name for a commit range, truncated commits for legibility
    pub fn cache_file_name(from_commit: &str, to_commit: &str) -> String {
        format!(
            "st-ops-{}-to-{}.json",
            short_commit(from_commit),
            short_commit(to_commit)
        )
    }

    /// Persist to the cache directory, returning the path written
    pub fn write_to_cache(&self, cache_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(cache_dir)
            .with_context(|| format!("failed to create cache dir {}", cache_dir.display()))?;
        let path = cache_dir.join(Self::cache_file_name(&self.from_commit, &self.to_commit));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write operations cache {}", path.display()))?;
        debug!("wrote operations cache {}", path.display());
        Ok(path)
    }

    /// Load a previously cached operation set for the commit range, if one
    /// exists
    pub fn load_from_cache(
        cache_dir: &Path,
        from_commit: &str,
        to_commit: &str,
    ) -> Result<Option<Self>> {
        let path = cache_dir.join(Self::cache_file_name(from_commit, to_commit));
        if !path.is_file() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("failed to read operations cache {}", path.display()))?;
        let loaded: OperationsForRepository = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse operations cache {}", path.display()))?;
        if loaded.from_commit != from_commit || loaded.to_commit != to_commit {
            return Err(anyhow!(
                "operations cache {} contains commit range {}..{}, expected {}..{}",
                path.display(),
                loaded.from_commit,
                loaded.to_commit,
                from_commit,
                to_commit
            ));
        }
        debug!("loaded operations cache {}", path.display());
        Ok(Some(loaded))
    }
}

/// Truncated commit sha for file names, matching the upstream 6-char habit
fn short_commit(commit: &str) -> &str {
    commit.get(..6).unwrap_or(commit)
}
