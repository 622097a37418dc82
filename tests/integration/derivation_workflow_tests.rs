/*!
 * Integration tests for repository-level derivation and caching, running
 * against canned git collaborators
 */

use std::sync::Arc;

use anyhow::Result;

use stsync::errors::SyncError;
use stsync::git::{Hunk, HunkLine, LineOrigin};
use stsync::marker_csv::serialize_records;
use stsync::operations::OperationType;
use stsync::repo_operations::RepositoryOperationComputer;

use crate::common::{self, CannedDiff, CannedReader, CannedStatus};

const CONTENT_PATH: &str = "content/57/eng0103.at";
const MARKER_PATH: &str = "content/57/eng0103.subtitle_markers.csv";

fn merge_hunk() -> Hunk {
    Hunk::new(vec![
        HunkLine::new(
            LineOrigin::Deletion,
            "@sentence one. @Sentence two.\n",
            Some(1),
        ),
        HunkLine::new(
            LineOrigin::Addition,
            "@sentence one. Sentence two.\n",
            None,
        ),
    ])
}

fn ready_status() -> CannedStatus {
    CannedStatus {
        name: "english".to_string(),
        head: "to".to_string(),
        branch: "master".to_string(),
        clean: true,
    }
}

fn canned_computer_with_status(status: CannedStatus) -> RepositoryOperationComputer {
    common::init_test_logging();
    let mut diff = CannedDiff::default();
    diff.changed = vec![CONTENT_PATH.to_string(), "docs/readme.md".to_string()];
    diff.hunks.insert(CONTENT_PATH.to_string(), vec![merge_hunk()]);

    let mut reader = CannedReader::default();
    reader.insert_at(
        "from",
        CONTENT_PATH,
        "@sentence one. @Sentence two.\n",
    );
    let marker_content =
        serialize_records(&[common::record("st-1"), common::record("st-2")]);
    reader.insert_lagged("from", MARKER_PATH, &marker_content);

    RepositoryOperationComputer::new(Arc::new(diff), Arc::new(reader), Arc::new(status), "master")
}

fn canned_computer() -> RepositoryOperationComputer {
    canned_computer_with_status(ready_status())
}

#[tokio::test]
async fn test_repositoryDerivation_withMergeHunk_shouldYieldOneFileSet() -> Result<()> {
    let computer = canned_computer();
    let repo_ops = computer.compute("from", "to", None).await?;

    assert_eq!(repo_ops.repository_name, "english");
    assert_eq!(repo_ops.affected_product_identity_ids(), vec!["0103"]);
    let file_ops = repo_ops.operations_for_product("0103").unwrap();
    assert_eq!(file_ops.operations.len(), 1);
    assert_eq!(
        file_ops.operations[0].operation_type(),
        OperationType::Merge
    );
    assert_eq!(file_ops.subtitles_count_delta(), -1);
    Ok(())
}

#[tokio::test]
async fn test_repositoryDerivation_withStaleHead_shouldRefuse() {
    let computer = canned_computer();
    let err = computer.compute("from", "not-head", None).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::StaleCommitRange { .. })
    ));
}

#[tokio::test]
async fn test_repositoryDerivation_withWrongBranch_shouldRefuse() {
    let mut status = ready_status();
    status.branch = "feature".to_string();
    let computer = canned_computer_with_status(status);

    let err = computer.compute("from", "to", None).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::RepositoryNotReady { .. })
    ));
}

#[tokio::test]
async fn test_repositoryDerivation_withDirtyTree_shouldRefuse() {
    let mut status = ready_status();
    status.clean = false;
    let computer = canned_computer_with_status(status);

    let err = computer.compute("from", "to", None).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::RepositoryNotReady { .. })
    ));
}

#[tokio::test]
async fn test_repositoryDerivation_withAllowlist_shouldSkipOtherFiles() -> Result<()> {
    let computer = canned_computer();
    let allowlist = vec!["content/57/eng0500.at".to_string()];
    let repo_ops = computer.compute("from", "to", Some(&allowlist)).await?;
    assert!(repo_ops.files.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_repositoryDerivation_withCache_shouldReuseSecondTime() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let computer = canned_computer();

    let (first, fresh) = computer
        .compute_or_load_cached(temp_dir.path(), "from", "to", None)
        .await?;
    assert!(fresh);

    let (second, fresh) = computer
        .compute_or_load_cached(temp_dir.path(), "from", "to", None)
        .await?;
    assert!(!fresh);
    assert_eq!(first, second);
    Ok(())
}
