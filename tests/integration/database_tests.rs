/*!
 * Pipeline state persisted in an on-disk database
 */

use manifest_sync::database::models::{AppRecord, AppStatus, FileStatus};
use manifest_sync::database::{DatabaseConnection, Repository};

use crate::common::{seed_app, seed_manifest};

#[tokio::test]
async fn test_retryState_shouldSurviveReopeningTheDatabase() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("catalog.db");

    {
        let repo = Repository::new(DatabaseConnection::new(&path).unwrap());
        seed_app(&repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();
        repo.record_fetch_failure(1).await.unwrap();
        repo.record_fetch_failure(1).await.unwrap();
    }

    let repo = Repository::new(DatabaseConnection::new(&path).unwrap());
    let state = repo.get_retry_state(1).await.unwrap();
    assert_eq!(state.failure_count, 2);
    assert!(state.last_attempt_at.is_some());
    assert_eq!(repo.connection().path(), path.as_path());
}

#[tokio::test]
async fn test_resetIfUnchanged_withStaleRevision_shouldKeepCount() {
    let repo = Repository::new_in_memory().unwrap();
    seed_app(&repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();

    let first = repo.record_fetch_failure(1).await.unwrap();
    repo.record_fetch_failure(1).await.unwrap();

    assert!(!repo.reset_failures_if_unchanged(1, first.revision).await.unwrap());
    assert_eq!(repo.get_retry_state(1).await.unwrap().failure_count, 2);

    let current = repo.get_retry_state(1).await.unwrap();
    assert!(repo.reset_failures_if_unchanged(1, current.revision).await.unwrap());
    assert_eq!(repo.get_retry_state(1).await.unwrap().failure_count, 0);
}

#[tokio::test]
async fn test_listReconcilable_shouldSkipInactiveAndPackagedApps() {
    let repo = Repository::new_in_memory().unwrap();
    seed_app(&repo, 1, "Hosted", AppStatus::ApprovedFull).await.unwrap();
    seed_app(&repo, 2, "Disabled", AppStatus::Disabled).await.unwrap();
    seed_app(&repo, 3, "Blocked", AppStatus::Blocked).await.unwrap();

    let packaged = AppRecord::new(
        4,
        "https://apps.example.com/4/manifest.webapp".to_string(),
        "Packaged".to_string(),
        "dev@example.com".to_string(),
        "en".to_string(),
    )
    .packaged();
    repo.create_app(&packaged).await.unwrap();

    assert_eq!(repo.list_reconcilable_app_ids(false).await.unwrap(), vec![1]);

    let mut with_packaged = repo.list_reconcilable_app_ids(true).await.unwrap();
    with_packaged.sort();
    assert_eq!(with_packaged, vec![1, 4]);
}

#[tokio::test]
async fn test_stats_shouldCountPipelineState() {
    let repo = Repository::new_in_memory().unwrap();
    seed_app(&repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();
    seed_app(&repo, 2, "Other", AppStatus::Incomplete).await.unwrap();
    seed_manifest(&repo, 1, r#"{"name": "MozillaBall"}"#, FileStatus::ApprovedFull).await.unwrap();
    repo.record_fetch_failure(2).await.unwrap();

    let stats = repo.connection().stats().unwrap();
    assert_eq!(stats.app_count, 2);
    assert_eq!(stats.file_count, 1);
    assert_eq!(stats.failing_app_count, 1);
    assert_eq!(stats.review_queue_count, 0);
    assert!(stats.to_string().starts_with("Apps: 2"));
}
