/*!
 * Repository-level operation derivation.
 *
 * Walks the files changed between two commits, derives each content file's
 * operations off the main runtime threads, and rolls the non-empty sets up
 * into an `OperationsForRepository`. Derivation is deterministic over a
 * commit range, so results are cached to disk and reloaded on repeat runs.
 */

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::SyncError;
use crate::file_operations::compute_operations_for_file;
use crate::git::{
    CommitScope, DiffProvider, GitContentReader, RepositoryStatus, ensure_repository_ready,
};
use crate::marker_csv::{marker_file_path, parse_records};
use crate::operations::{OperationsForFile, OperationsForRepository};

/// Content files live under `content/` and end in a 4-digit product
/// identity followed by the `.at` extension
static CONTENT_FILE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"content/.*(\d{4})\.at$").unwrap());

/// Product identity of a content file path, or `None` for paths that are
/// not content files
pub fn product_identity_id(path: &str) -> Option<String> {
    CONTENT_FILE_REGEX
        .captures(path)
        .map(|caps| caps[1].to_string())
}

/// Derives operations for every changed content file of one repository
pub struct RepositoryOperationComputer {
    diff: Arc<dyn DiffProvider>,
    reader: Arc<dyn GitContentReader>,
    status: Arc<dyn RepositoryStatus>,
    expected_branch: String,
}

impl RepositoryOperationComputer {
    /// Wire up a computer over the git collaborator seams
    pub fn new(
        diff: Arc<dyn DiffProvider>,
        reader: Arc<dyn GitContentReader>,
        status: Arc<dyn RepositoryStatus>,
        expected_branch: impl Into<String>,
    ) -> Self {
        RepositoryOperationComputer {
            diff,
            reader,
            status,
            expected_branch: expected_branch.into(),
        }
    }

    /// Derive operations for all content files changed in the commit range,
    /// restricted to `file_list` when one is given. The repository must be
    /// clean and on the expected branch, and `to_commit` must be its head;
    /// deriving against a stale range would produce operations nothing
    /// downstream can apply.
    pub async fn compute(
        &self,
        from_commit: &str,
        to_commit: &str,
        file_list: Option<&[String]>,
    ) -> Result<OperationsForRepository> {
        ensure_repository_ready(&*self.status, &self.expected_branch)?;
        let head = self.status.head_commit()?;
        if head != to_commit {
            return Err(SyncError::StaleCommitRange {
                requested: to_commit.to_string(),
                current: head,
            }
            .into());
        }

        let changed = self.diff.changed_files(from_commit, to_commit)?;
        let content_files: Vec<(String, String)> = changed
            .into_iter()
            .filter(|path| file_list.is_none_or(|list| list.iter().any(|f| f == path)))
            .filter_map(|path| product_identity_id(&path).map(|id| (path, id)))
            .collect();
        info!(
            "deriving operations for {} content file(s), {}..{}",
            content_files.len(),
            from_commit,
            to_commit
        );

        // One blocking task per file; handles awaited in changed-file order
        let mut handles = Vec::with_capacity(content_files.len());
        for (path, identity) in content_files {
            let diff = Arc::clone(&self.diff);
            let reader = Arc::clone(&self.reader);
            let from_commit = from_commit.to_string();
            let to_commit = to_commit.to_string();
            handles.push(tokio::task::spawn_blocking(move || {
                compute_one_file(&*diff, &*reader, &from_commit, &to_commit, &path, &identity)
            }));
        }

        let mut files = Vec::new();
        for handle in handles {
            if let Some(ops) = handle.await?? {
                if !ops.is_empty() {
                    files.push(ops);
                }
            }
        }

        Ok(OperationsForRepository::new(
            self.status.name(),
            from_commit,
            to_commit,
            files,
        ))
    }

    /// Load the cached operation set for the commit range, or derive and
    /// cache it. The boolean reports whether a fresh derivation ran.
    pub async fn compute_or_load_cached(
        &self,
        cache_dir: &Path,
        from_commit: &str,
        to_commit: &str,
        file_list: Option<&[String]>,
    ) -> Result<(OperationsForRepository, bool)> {
        if let Some(cached) =
            OperationsForRepository::load_from_cache(cache_dir, from_commit, to_commit)?
        {
            return Ok((cached, false));
        }
        let computed = self.compute(from_commit, to_commit, file_list).await?;
        computed.write_to_cache(cache_dir)?;
        Ok((computed, true))
    }
}

fn compute_one_file(
    diff: &dyn DiffProvider,
    reader: &dyn GitContentReader,
    from_commit: &str,
    to_commit: &str,
    path: &str,
    product_identity_id: &str,
) -> Result<Option<OperationsForFile>> {
    let Some(from_content) = reader.read_file(from_commit, CommitScope::AtCommit, path)? else {
        // File did not exist at from_commit; nothing to derive against
        warn!("skipping {path}: not present at {from_commit}");
        return Ok(None);
    };

    // Marker files are committed one commit behind the content they
    // describe, hence the wider scope
    let marker_path = marker_file_path(path);
    let marker_content = reader
        .read_file(from_commit, CommitScope::AtChildOrCurrent, &marker_path)?
        .with_context(|| format!("marker file {marker_path} not found for {path}"))?;
    let records = parse_records(&marker_content)
        .with_context(|| format!("failed to parse marker file {marker_path}"))?;

    let hunks = diff.hunks_for_file(from_commit, to_commit, path)?;
    debug!("{path}: {} hunk(s)", hunks.len());

    let ops = compute_operations_for_file(
        product_identity_id,
        &from_content,
        &records,
        &hunks,
        from_commit,
        to_commit,
    )
    .with_context(|| format!("failed to derive operations for {path}"))?;
    Ok(Some(ops))
}
