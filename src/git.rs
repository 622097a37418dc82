/*!
 * Git collaborator seams and the hunk input model.
 *
 * The engine never talks to a git library directly. It consumes hunks with
 * line-origin tags, reads files as of a commit, and asks a repository about
 * its head and cleanliness, all through the traits defined here. Concrete
 * implementations (libgit2, shelling out, in-memory fakes for tests) live
 * with the caller.
 */

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::errors::SyncError;

/// Origin tag of one diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOrigin {
    /// Unchanged context line
    Context,
    /// Line present only in the old version
    Deletion,
    /// Line present only in the new version
    Addition,
    /// Marker line for a newline added at end of file
    EofNewlineAdded,
}

/// One line of a hunk. `content` includes the trailing newline, as git
/// reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct HunkLine {
    /// Which side of the diff the line belongs to
    pub origin: LineOrigin,

    /// Raw line content including trailing newline
    pub content: String,

    /// 1-based line number in the old version, where applicable
    pub old_line_no: Option<u32>,
}

impl HunkLine {
    /// Create a hunk line
    pub fn new(origin: LineOrigin, content: impl Into<String>, old_line_no: Option<u32>) -> Self {
        HunkLine {
            origin,
            content: content.into(),
            old_line_no,
        }
    }
}

/// A contiguous diff region, ordered lines with origin tags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hunk {
    /// Lines in diff order
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Create a hunk from its lines
    pub fn new(lines: Vec<HunkLine>) -> Self {
        Hunk { lines }
    }

    /// Old-version line numbers covered by this hunk's deletion lines
    pub fn deleted_line_numbers(&self) -> Vec<u32> {
        self.lines
            .iter()
            .filter(|l| l.origin == LineOrigin::Deletion)
            .filter_map(|l| l.old_line_no)
            .collect()
    }
}

/// Which snapshot of a file to read relative to a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitScope {
    /// The file exactly as of the commit
    AtCommit,
    /// The file as of the first later commit that touched it, falling back
    /// to current on-disk contents. Timing marker files are updated during
    /// sync but committed one commit later, so their fresh state lives one
    /// commit behind the content they describe.
    AtChildOrCurrent,
}

/// Provides per-file hunks between two commits, with zero context lines
pub trait DiffProvider: Send + Sync {
    /// Paths of files that changed between the two commits
    fn changed_files(&self, from_commit: &str, to_commit: &str) -> Result<Vec<String>>;

    /// Hunks for one file between the two commits
    fn hunks_for_file(&self, from_commit: &str, to_commit: &str, path: &str) -> Result<Vec<Hunk>>;
}

/// Reads repository files as of a commit
pub trait GitContentReader: Send + Sync {
    /// File contents for `path` relative to `commit` per `scope`, or `None`
    /// if the file did not exist there
    fn read_file(&self, commit: &str, scope: CommitScope, path: &str) -> Result<Option<String>>;
}

/// Repository state queries used by the pre-flight checks
pub trait RepositoryStatus: Send + Sync {
    /// Repository name
    fn name(&self) -> &str;

    /// Sha of the current local head commit
    fn head_commit(&self) -> Result<String>;

    /// Name of the currently checked out branch
    fn current_branch(&self) -> Result<String>;

    /// Whether the working tree has no uncommitted changes
    fn is_clean(&self) -> Result<bool>;
}

/// Pre-flight readiness check. Refuses the whole sync rather than partially
/// syncing against a dirty or misplaced repository.
pub fn ensure_repository_ready(
    repository: &dyn RepositoryStatus,
    expected_branch: &str,
) -> Result<(), SyncError> {
    let not_ready = |reason: String| SyncError::RepositoryNotReady {
        name: repository.name().to_string(),
        reason,
    };

    let branch = repository
        .current_branch()
        .map_err(|e| not_ready(format!("could not determine current branch: {e}")))?;
    if branch != expected_branch {
        return Err(not_ready(format!(
            "on branch {branch:?}, expected {expected_branch:?}"
        )));
    }

    let clean = repository
        .is_clean()
        .map_err(|e| not_ready(format!("could not determine working tree state: {e}")))?;
    if !clean {
        return Err(not_ready("working tree has uncommitted changes".to_string()));
    }

    Ok(())
}
