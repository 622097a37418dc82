/*!
 * Foreign-file sync state and the foreign content store seam.
 *
 * Every foreign content file carries a sidecar with its sync pointer (the
 * primary commit its content reflects), the review flags accumulated by
 * applied operations, and the time of the last sync. The transfer engine
 * reads and writes files only through the `ForeignContentStore` trait;
 * `DiskForeignStore` is the on-disk implementation used in production.
 */

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::operations::OperationType;

/// Sync state of one foreign content file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSyncState {
    /// Primary commit this file's content reflects, `None` before the
    /// first sync
    #[serde(default)]
    pub last_synced_commit: Option<String>,

    /// Subtitles whose placement needs human review, with the operation
    /// type that flagged them
    #[serde(default)]
    pub subtitles_to_review: BTreeMap<String, OperationType>,

    /// RFC 3339 timestamp of the last pointer advance
    #[serde(default)]
    pub synced_at: Option<String>,
}

impl FileSyncState {
    /// Fold new review flags into the accumulated set. Existing flags stay
    /// until a human clears them; newer operations win on overlap.
    pub fn merge_review_flags(&mut self, flags: BTreeMap<String, OperationType>) {
        self.subtitles_to_review.extend(flags);
    }

    /// Advance the sync pointer to `commit` and stamp the sync time
    pub fn advance(&mut self, commit: &str) {
        self.last_synced_commit = Some(commit.to_string());
        self.synced_at = Some(Utc::now().to_rfc3339());
    }
}

/// Storage seam for foreign content files and their sync sidecars
pub trait ForeignContentStore: Send + Sync {
    /// Product identities of all foreign content files in the store
    fn product_identity_ids(&self) -> Result<Vec<String>>;

    /// Content of the foreign file for a product identity
    fn load_content(&self, product_identity_id: &str) -> Result<String>;

    /// Replace the content of the foreign file for a product identity
    fn store_content(&self, product_identity_id: &str, content: &str) -> Result<()>;

    /// Sync state for a product identity; default state if none stored yet
    fn load_sync_state(&self, product_identity_id: &str) -> Result<FileSyncState>;

    /// Persist the sync state for a product identity
    fn store_sync_state(&self, product_identity_id: &str, state: &FileSyncState) -> Result<()>;
}

static FOREIGN_FILE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})\.at$").unwrap());

/// On-disk foreign store: content files are `*.at` files named by their
/// 4-digit product identity, sync sidecars sit next to them as
/// `*.sync.json`
pub struct DiskForeignStore {
    root: PathBuf,
}

impl DiskForeignStore {
    /// Open a store rooted at a directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DiskForeignStore { root: root.into() }
    }

    fn content_path_for(&self, product_identity_id: &str) -> Result<PathBuf> {
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_string_lossy().into_owned();
            if let Some(caps) = FOREIGN_FILE_REGEX.captures(&path) {
                if &caps[1] == product_identity_id {
                    return Ok(entry.into_path());
                }
            }
        }
        Err(anyhow!(
            "no foreign content file for product identity {product_identity_id} under {}",
            self.root.display()
        ))
    }

    fn sidecar_path(content_path: &Path) -> PathBuf {
        let name = content_path.to_string_lossy();
        match name.strip_suffix(".at") {
            Some(stem) => PathBuf::from(format!("{stem}.sync.json")),
            None => PathBuf::from(format!("{name}.sync.json")),
        }
    }
}

impl ForeignContentStore for DiskForeignStore {
    fn product_identity_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_string_lossy();
            if let Some(caps) = FOREIGN_FILE_REGEX.captures(&path) {
                ids.push(caps[1].to_string());
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn load_content(&self, product_identity_id: &str) -> Result<String> {
        let path = self.content_path_for(product_identity_id)?;
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read foreign content {}", path.display()))
    }

    fn store_content(&self, product_identity_id: &str, content: &str) -> Result<()> {
        let path = self.content_path_for(product_identity_id)?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write foreign content {}", path.display()))?;
        debug!("wrote foreign content {}", path.display());
        Ok(())
    }

    fn load_sync_state(&self, product_identity_id: &str) -> Result<FileSyncState> {
        let sidecar = Self::sidecar_path(&self.content_path_for(product_identity_id)?);
        if !sidecar.is_file() {
            return Ok(FileSyncState::default());
        }
        let json = fs::read_to_string(&sidecar)
            .with_context(|| format!("failed to read sync state {}", sidecar.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("failed to parse sync state {}", sidecar.display()))
    }

    fn store_sync_state(&self, product_identity_id: &str, state: &FileSyncState) -> Result<()> {
        let sidecar = Self::sidecar_path(&self.content_path_for(product_identity_id)?);
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&sidecar, json)
            .with_context(|| format!("failed to write sync state {}", sidecar.display()))?;
        debug!("wrote sync state {}", sidecar.display());
        Ok(())
    }
}
