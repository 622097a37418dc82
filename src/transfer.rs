/*!
 * Foreign transfer engine.
 *
 * Replays primary-side operation sets onto foreign-language content files.
 * Application is an explicit fold per file: each operation set transforms
 * the content produced by the previous one, with the sync state threaded
 * alongside, so the sequential dependency is visible and testable without
 * real file I/O. Different files are independent; the engine is
 * single-writer per file by construction.
 *
 * The textual edit for one operation is delegated to the `OperationApplier`
 * seam. The engine owns sequencing, the commit-chain and count checks, and
 * the sync-state bookkeeping around it.
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::errors::SyncError;
use crate::git::{CommitScope, GitContentReader};
use crate::marker_csv::{SubtitleRecord, parse_records};
use crate::operations::{Operation, OperationsForFile, OperationsForRepository};
use crate::subtitle::count_marks;
use crate::sync_data::{FileSyncState, ForeignContentStore};

/// Maps one operation to a textual edit on foreign content. The timing
/// snapshots give the primary-side mark positions before and after the
/// operation set, which the applier uses to place its edits.
pub trait OperationApplier: Send + Sync {
    /// Apply one operation to foreign content, returning the new content
    fn apply(
        &self,
        operation: &Operation,
        content: &str,
        from_records: &[SubtitleRecord],
        to_records: &[SubtitleRecord],
    ) -> Result<String>;
}

/// Primary-side timing snapshots, as of a commit
pub trait PrimaryTimingSource: Send + Sync {
    /// Timing records for a product identity as of `commit` per `scope`
    fn records(
        &self,
        product_identity_id: &str,
        commit: &str,
        scope: CommitScope,
    ) -> Result<Vec<SubtitleRecord>>;
}

/// Timing source backed by the primary repository's git history
pub struct GitPrimaryTimingSource {
    reader: Arc<dyn GitContentReader>,
    marker_paths: BTreeMap<String, String>,
}

impl GitPrimaryTimingSource {
    /// Wire up a timing source over a content reader and the mapping from
    /// product identity to marker file path
    pub fn new(reader: Arc<dyn GitContentReader>, marker_paths: BTreeMap<String, String>) -> Self {
        GitPrimaryTimingSource {
            reader,
            marker_paths,
        }
    }
}

impl PrimaryTimingSource for GitPrimaryTimingSource {
    fn records(
        &self,
        product_identity_id: &str,
        commit: &str,
        scope: CommitScope,
    ) -> Result<Vec<SubtitleRecord>> {
        let path = self
            .marker_paths
            .get(product_identity_id)
            .with_context(|| format!("no marker file known for product {product_identity_id}"))?;
        let content = self
            .reader
            .read_file(commit, scope, path)?
            .with_context(|| format!("marker file {path} not found at {commit}"))?;
        parse_records(&content).with_context(|| format!("failed to parse marker file {path}"))
    }
}

/// What a sync did for one foreign file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// One or more operation sets were applied to the content
    Synced {
        /// Number of operation sets applied
        applied_sets: usize,
    },
    /// Only empty operation sets; the pointer advanced without edits
    PointerAdvanced,
    /// The file was already at the final commit
    AlreadyCurrent,
}

/// Index of the first operation set the stored pointer has not passed yet.
/// A pointer mid-chain resumes at the set chaining from it; a pointer at
/// the end of the chain skips everything; a pointer matching no commit in
/// a non-empty chain is a stale history.
fn resume_position(state: &FileSyncState, operation_sets: &[OperationsForFile]) -> Result<usize> {
    let Some(pointer) = state.last_synced_commit.as_deref() else {
        return Ok(0);
    };
    if let Some(idx) = operation_sets
        .iter()
        .position(|set| set.from_commit == pointer)
    {
        return Ok(idx);
    }
    if operation_sets.iter().any(|set| set.to_commit == pointer) {
        return Ok(operation_sets.len());
    }
    match operation_sets.first() {
        Some(first) => Err(SyncError::StaleCommitRange {
            requested: first.from_commit.clone(),
            current: pointer.to_string(),
        }
        .into()),
        None => Ok(0),
    }
}

/// Replays operation sets onto the files of one foreign repository
pub struct ForeignTransferEngine {
    applier: Arc<dyn OperationApplier>,
    timing: Arc<dyn PrimaryTimingSource>,
}

impl ForeignTransferEngine {
    /// Wire up an engine over its applier and timing seams
    pub fn new(applier: Arc<dyn OperationApplier>, timing: Arc<dyn PrimaryTimingSource>) -> Self {
        ForeignTransferEngine { applier, timing }
    }

    /// Sync one foreign file through an ordered chain of operation sets.
    /// Sets the stored pointer has already passed are skipped, so a retried
    /// or interrupted sync resumes instead of reapplying or failing.
    pub fn sync_file(
        &self,
        store: &dyn ForeignContentStore,
        product_identity_id: &str,
        operation_sets: &[OperationsForFile],
    ) -> Result<TransferOutcome> {
        let mut state = store.load_sync_state(product_identity_id)?;
        let mut applied_sets = 0usize;
        let mut advanced = false;

        let resume_at = resume_position(&state, operation_sets)?;
        if resume_at > 0 {
            debug!(
                "product {product_identity_id}: pointer already past {} set(s), resuming",
                resume_at
            );
        }

        for set in &operation_sets[resume_at..] {
            if state.last_synced_commit.as_deref() == Some(set.to_commit.as_str()) {
                debug!(
                    "product {product_identity_id}: already at {}, skipping",
                    set.to_commit
                );
                continue;
            }
            if let Some(current) = state.last_synced_commit.as_deref() {
                if current != set.from_commit {
                    return Err(SyncError::StaleCommitRange {
                        requested: set.from_commit.clone(),
                        current: current.to_string(),
                    }
                    .into());
                }
            }

            if !set.is_empty() {
                // Reload inside the loop: each set applies to the previous
                // set's result
                let content = store.load_content(product_identity_id)?;
                let new_content = self.apply_operation_set(product_identity_id, &content, set)?;
                store.store_content(product_identity_id, &new_content)?;
                state.merge_review_flags(set.subtitles_requiring_review());
                applied_sets += 1;
            }

            // A no-op sync still records that the file is current
            state.advance(&set.to_commit);
            store.store_sync_state(product_identity_id, &state)?;
            advanced = true;
        }

        Ok(if applied_sets > 0 {
            TransferOutcome::Synced { applied_sets }
        } else if advanced {
            TransferOutcome::PointerAdvanced
        } else {
            TransferOutcome::AlreadyCurrent
        })
    }

    fn apply_operation_set(
        &self,
        product_identity_id: &str,
        content: &str,
        set: &OperationsForFile,
    ) -> Result<String> {
        let from_records =
            self.timing
                .records(product_identity_id, &set.from_commit, CommitScope::AtCommit)?;
        // Timing commits lag content commits by one, hence the wider scope
        let to_records = self.timing.records(
            product_identity_id,
            &set.to_commit,
            CommitScope::AtChildOrCurrent,
        )?;

        let expected = from_records.len() as i64 + set.subtitles_count_delta();
        if expected != to_records.len() as i64 {
            return Err(SyncError::CountMismatch {
                path: product_identity_id.to_string(),
                old_count: from_records.len(),
                delta: set.subtitles_count_delta(),
                new_count: to_records.len(),
            }
            .into());
        }
        let foreign_marks = content.lines().map(count_marks).sum::<usize>();
        if foreign_marks != from_records.len() {
            return Err(SyncError::CountMismatch {
                path: product_identity_id.to_string(),
                old_count: from_records.len(),
                delta: 0,
                new_count: foreign_marks,
            }
            .into());
        }

        let mut current = content.to_string();
        for operation in &set.operations {
            current = self
                .applier
                .apply(operation, &current, &from_records, &to_records)
                .with_context(|| {
                    format!(
                        "failed to apply {} operation to product {product_identity_id}",
                        operation.operation_type()
                    )
                })?;
        }
        Ok(current)
    }

    /// Sync every foreign file in a store through a chronological chain of
    /// repository operation sets. Files without derived operations in a set
    /// get an empty set for that range so their pointers advance too.
    pub fn sync_repository(
        &self,
        store: &dyn ForeignContentStore,
        repository_sets: &[OperationsForRepository],
    ) -> Result<BTreeMap<String, TransferOutcome>> {
        let mut outcomes = BTreeMap::new();
        for product_identity_id in store.product_identity_ids()? {
            let chain: Vec<OperationsForFile> = repository_sets
                .iter()
                .map(|repo_set| {
                    repo_set
                        .operations_for_product(&product_identity_id)
                        .cloned()
                        .unwrap_or_else(|| {
                            OperationsForFile::new(
                                product_identity_id.clone(),
                                repo_set.from_commit.clone(),
                                repo_set.to_commit.clone(),
                                Vec::new(),
                            )
                        })
                })
                .collect();
            let outcome = self
                .sync_file(store, &product_identity_id, &chain)
                .with_context(|| format!("failed to sync product {product_identity_id}"))?;
            info!("product {product_identity_id}: {outcome:?}");
            outcomes.insert(product_identity_id, outcome);
        }
        Ok(outcomes)
    }
}
