/*!
 * Common test utilities for the stsync test suite: in-memory fakes for the
 * git collaborator seams, the foreign content store and the transfer seams.
 */

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use stsync::git::{
    CommitScope, DiffProvider, GitContentReader, Hunk, RepositoryStatus,
};
use stsync::marker_csv::SubtitleRecord;
use stsync::operations::{Operation, OperationKind};
use stsync::sync_data::{FileSyncState, ForeignContentStore};
use stsync::transfer::{OperationApplier, PrimaryTimingSource};

/// Initializes logging for tests, safe to call repeatedly
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// A timing record with fixed timing fields
pub fn record(persistent_id: &str) -> SubtitleRecord {
    SubtitleRecord {
        relative_milliseconds: 1000,
        samples: 44100,
        char_length: 10,
        persistent_id: persistent_id.to_string(),
        record_id: Some("rec-1".to_string()),
    }
}

/// Canned diff provider returning fixed changed files and per-path hunks
#[derive(Default)]
pub struct CannedDiff {
    pub changed: Vec<String>,
    pub hunks: BTreeMap<String, Vec<Hunk>>,
}

impl DiffProvider for CannedDiff {
    fn changed_files(&self, _from_commit: &str, _to_commit: &str) -> Result<Vec<String>> {
        Ok(self.changed.clone())
    }

    fn hunks_for_file(
        &self,
        _from_commit: &str,
        _to_commit: &str,
        path: &str,
    ) -> Result<Vec<Hunk>> {
        Ok(self.hunks.get(path).cloned().unwrap_or_default())
    }
}

/// Canned content reader keyed by commit and path, with a separate map for
/// the lagging commit scope
#[derive(Default)]
pub struct CannedReader {
    at_commit: BTreeMap<(String, String), String>,
    lagged: BTreeMap<(String, String), String>,
}

impl CannedReader {
    pub fn insert_at(&mut self, commit: &str, path: &str, content: &str) {
        self.at_commit
            .insert((commit.to_string(), path.to_string()), content.to_string());
    }

    pub fn insert_lagged(&mut self, commit: &str, path: &str, content: &str) {
        self.lagged
            .insert((commit.to_string(), path.to_string()), content.to_string());
    }
}

impl GitContentReader for CannedReader {
    fn read_file(&self, commit: &str, scope: CommitScope, path: &str) -> Result<Option<String>> {
        let key = (commit.to_string(), path.to_string());
        let found = match scope {
            CommitScope::AtCommit => self.at_commit.get(&key),
            CommitScope::AtChildOrCurrent => {
                self.lagged.get(&key).or_else(|| self.at_commit.get(&key))
            }
        };
        Ok(found.cloned())
    }
}

/// Canned repository status
pub struct CannedStatus {
    pub name: String,
    pub head: String,
    pub branch: String,
    pub clean: bool,
}

impl RepositoryStatus for CannedStatus {
    fn name(&self) -> &str {
        &self.name
    }

    fn head_commit(&self) -> Result<String> {
        Ok(self.head.clone())
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.clean)
    }
}

/// In-memory foreign content store
#[derive(Default)]
pub struct MemoryForeignStore {
    pub files: Mutex<BTreeMap<String, String>>,
    pub states: Mutex<BTreeMap<String, FileSyncState>>,
}

impl MemoryForeignStore {
    pub fn with_file(product_identity_id: &str, content: &str) -> Self {
        let store = MemoryForeignStore::default();
        store
            .files
            .lock()
            .unwrap()
            .insert(product_identity_id.to_string(), content.to_string());
        store
    }

    pub fn content(&self, product_identity_id: &str) -> Option<String> {
        self.files.lock().unwrap().get(product_identity_id).cloned()
    }

    pub fn state(&self, product_identity_id: &str) -> Option<FileSyncState> {
        self.states
            .lock()
            .unwrap()
            .get(product_identity_id)
            .cloned()
    }
}

impl ForeignContentStore for MemoryForeignStore {
    fn product_identity_ids(&self) -> Result<Vec<String>> {
        Ok(self.files.lock().unwrap().keys().cloned().collect())
    }

    fn load_content(&self, product_identity_id: &str) -> Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(product_identity_id)
            .cloned()
            .ok_or_else(|| anyhow!("no content for {product_identity_id}"))
    }

    fn store_content(&self, product_identity_id: &str, content: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(product_identity_id.to_string(), content.to_string());
        Ok(())
    }

    fn load_sync_state(&self, product_identity_id: &str) -> Result<FileSyncState> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(product_identity_id)
            .cloned()
            .unwrap_or_default())
    }

    fn store_sync_state(&self, product_identity_id: &str, state: &FileSyncState) -> Result<()> {
        self.states
            .lock()
            .unwrap()
            .insert(product_identity_id.to_string(), state.clone());
        Ok(())
    }
}

/// Canned primary timing source keyed by product identity and commit, scope
/// is ignored
#[derive(Default)]
pub struct CannedTiming {
    records: BTreeMap<(String, String), Vec<SubtitleRecord>>,
}

impl CannedTiming {
    pub fn insert(&mut self, product_identity_id: &str, commit: &str, records: Vec<SubtitleRecord>) {
        self.records
            .insert((product_identity_id.to_string(), commit.to_string()), records);
    }
}

impl PrimaryTimingSource for CannedTiming {
    fn records(
        &self,
        product_identity_id: &str,
        commit: &str,
        _scope: CommitScope,
    ) -> Result<Vec<SubtitleRecord>> {
        self.records
            .get(&(product_identity_id.to_string(), commit.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("no timing records for {product_identity_id} at {commit}"))
    }
}

/// Minimal applier that keeps the foreign mark count consistent with the
/// operation's count delta: inserts and splits append a marked caption,
/// deletes and merges drop the last mark, moves leave the content alone
pub struct MarkCountApplier;

impl OperationApplier for MarkCountApplier {
    fn apply(
        &self,
        operation: &Operation,
        content: &str,
        _from_records: &[SubtitleRecord],
        _to_records: &[SubtitleRecord],
    ) -> Result<String> {
        match operation.kind {
            OperationKind::Insert { .. } | OperationKind::Split => Ok(format!("{content}@new")),
            OperationKind::Delete { .. } | OperationKind::Merge => {
                match content.rfind('@') {
                    Some(idx) => Ok(format!("{}{}", &content[..idx], &content[idx + 1..])),
                    None => Err(anyhow!("no mark left to remove")),
                }
            }
            OperationKind::MoveLeft
            | OperationKind::MoveRight
            | OperationKind::ContentChange => Ok(content.to_string()),
        }
    }
}
