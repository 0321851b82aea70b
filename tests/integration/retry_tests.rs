/*!
 * Consecutive fetch failures: counting, notification and escalation
 */

use manifest_sync::database::models::{AppStatus, ReviewReason};
use manifest_sync::errors::FetchError;
use manifest_sync::integrations::mock::{MockFetcher, MockValidator};

use crate::common::{seed_app, TestPipeline};

const MANIFEST: &str = r#"{"name": "MozillaBall"}"#;

fn failing_pipeline() -> TestPipeline {
    TestPipeline::build(
        MockFetcher::failing(FetchError::HttpStatus { status_code: 503 }),
        MockValidator::passing(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetchFailures_uptoThree_shouldNotifyExactlyOnce() {
    let pipeline = failing_pipeline();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();

    pipeline.cycle(1).await;
    pipeline.cycle(1).await;
    assert_eq!(pipeline.notifier.call_count(), 0);
    assert_eq!(pipeline.failure_count(1).await, 2);

    let report = pipeline.cycle(1).await;
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.retries_scheduled, 1);
    assert_eq!(pipeline.failure_count(1).await, 3);

    let notices = pipeline.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(!notices[0].has_link);
    assert!(notices[0].report_id.is_none());
    assert!(notices[0].error_message.contains("503"));
    assert_eq!(pipeline.review_entry_count(1).await, 0);
}

#[tokio::test]
async fn test_fetchFailures_fourth_shouldFlagOnceAndReset() {
    let pipeline = failing_pipeline();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedLimited).await.unwrap();

    for _ in 0..3 {
        pipeline.cycle(1).await;
    }
    let report = pipeline.cycle(1).await;

    assert_eq!(report.flags, 1);
    assert_eq!(report.retries_scheduled, 0);
    assert_eq!(pipeline.failure_count(1).await, 0);
    assert_eq!(pipeline.notifier.call_count(), 1);

    let entries = pipeline.repo.review_entries_for(1).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason_code, ReviewReason::ManifestUnreachable);

    // the count starts over, so the next failure is a first failure again
    pipeline.cycle(1).await;
    assert_eq!(pipeline.failure_count(1).await, 1);
    assert_eq!(pipeline.notifier.call_count(), 1);
    assert_eq!(pipeline.review_entry_count(1).await, 1);
}

#[tokio::test]
async fn test_fetchFailures_fourthOnUnapprovedApp_shouldResetWithoutFlag() {
    let pipeline = failing_pipeline();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::AwaitingReview).await.unwrap();

    for _ in 0..4 {
        pipeline.cycle(1).await;
    }

    assert_eq!(pipeline.review_entry_count(1).await, 0);
    assert_eq!(pipeline.failure_count(1).await, 0);
    assert_eq!(pipeline.notifier.call_count(), 1);
}

#[tokio::test]
async fn test_fetchFailures_withInterveningSuccess_shouldResetImmediately() {
    let pipeline = failing_pipeline();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();

    pipeline.cycle(1).await;
    pipeline.cycle(1).await;
    assert_eq!(pipeline.failure_count(1).await, 2);

    pipeline.fetcher.serve(MANIFEST);
    pipeline.cycle(1).await;
    assert_eq!(pipeline.failure_count(1).await, 0);

    pipeline.fetcher.fail(FetchError::Timeout(30));
    pipeline.cycle(1).await;
    pipeline.cycle(1).await;
    assert_eq!(pipeline.failure_count(1).await, 2);
    assert_eq!(pipeline.notifier.call_count(), 0);
}

#[tokio::test]
async fn test_fetchFailures_onSeveralApps_shouldBeCountedPerApp() {
    let pipeline = failing_pipeline();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();
    seed_app(&pipeline.repo, 2, "Other", AppStatus::ApprovedFull).await.unwrap();

    for _ in 0..3 {
        pipeline.scheduler.run_batch(vec![1, 2]).await;
    }
    pipeline.cycle(1).await;

    assert_eq!(pipeline.failure_count(1).await, 0);
    assert_eq!(pipeline.failure_count(2).await, 3);
    assert_eq!(pipeline.review_entry_count(1).await, 1);
    assert_eq!(pipeline.review_entry_count(2).await, 0);
    assert_eq!(pipeline.notifier.call_count(), 2);
}
