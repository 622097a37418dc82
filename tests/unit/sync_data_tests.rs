/*!
 * Tests for the on-disk foreign content store and its sync sidecars
 */

use std::collections::BTreeMap;
use std::fs;

use anyhow::Result;

use stsync::operations::OperationType;
use stsync::sync_data::{DiskForeignStore, FileSyncState, ForeignContentStore};

use crate::common;

#[test]
fn test_diskStore_withForeignFiles_shouldListProductIdentities() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    fs::create_dir_all(temp_dir.path().join("content/57"))?;
    fs::write(temp_dir.path().join("content/57/spn0103.at"), "@hola @mundo\n")?;
    fs::write(temp_dir.path().join("content/57/spn0104.at"), "@adios\n")?;
    fs::write(temp_dir.path().join("content/57/notes.txt"), "not content")?;

    let store = DiskForeignStore::new(temp_dir.path());
    assert_eq!(store.product_identity_ids()?, vec!["0103", "0104"]);
    Ok(())
}

#[test]
fn test_diskStore_withContentRoundTrip_shouldPersistChanges() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    fs::write(temp_dir.path().join("spn0103.at"), "@hola @mundo\n")?;

    let store = DiskForeignStore::new(temp_dir.path());
    assert_eq!(store.load_content("0103")?, "@hola @mundo\n");

    store.store_content("0103", "@hola @mundo nuevo\n")?;
    assert_eq!(store.load_content("0103")?, "@hola @mundo nuevo\n");
    Ok(())
}

#[test]
fn test_diskStore_withMissingSidecar_shouldReturnDefaultState() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    fs::write(temp_dir.path().join("spn0103.at"), "@hola\n")?;

    let store = DiskForeignStore::new(temp_dir.path());
    let state = store.load_sync_state("0103")?;
    assert_eq!(state, FileSyncState::default());
    assert!(state.last_synced_commit.is_none());
    Ok(())
}

#[test]
fn test_diskStore_withStoredState_shouldReloadIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    fs::write(temp_dir.path().join("spn0103.at"), "@hola\n")?;

    let store = DiskForeignStore::new(temp_dir.path());
    let mut state = FileSyncState::default();
    state.merge_review_flags(BTreeMap::from([(
        "st-7".to_string(),
        OperationType::Split,
    )]));
    state.advance("abc123");
    store.store_sync_state("0103", &state)?;

    assert!(temp_dir.path().join("spn0103.sync.json").is_file());
    let reloaded = store.load_sync_state("0103")?;
    assert_eq!(reloaded, state);
    assert_eq!(reloaded.last_synced_commit.as_deref(), Some("abc123"));
    Ok(())
}

#[test]
fn test_diskStore_withUnknownProduct_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = DiskForeignStore::new(temp_dir.path());
    assert!(store.load_content("0103").is_err());
    Ok(())
}
