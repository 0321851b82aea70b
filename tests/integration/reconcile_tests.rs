/*!
 * Full reconciliation cycles against an in-memory catalog
 */

use manifest_sync::database::models::{AppStatus, FileStatus};
use manifest_sync::errors::FetchError;
use manifest_sync::integrations::mock::{MockFetcher, MockValidator, ValidatorBehavior};
use manifest_sync::pipeline::RetryPayload;

use crate::common::{seed_app, seed_manifest, TestPipeline};

const MANIFEST: &str = r#"{"name": "MozillaBall", "default_locale": "en", "locales": {"es": {"name": "MozillaBall"}}}"#;

#[tokio::test]
async fn test_cycle_withNewManifest_shouldStoreVersionFileAndTranslations() {
    let pipeline = TestPipeline::serving(MANIFEST).unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::Incomplete).await.unwrap();

    let report = pipeline.cycle(1).await;
    assert_eq!(report.applied, 1);
    assert_eq!(report.errors, 0);

    let versions = pipeline.repo.versions_for_app(1).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].supported_locales, vec!["en".to_string(), "es".to_string()]);

    let files = pipeline.repo.files_for_app(1).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].status, FileStatus::Pending);

    let names = pipeline.repo.translations_for("app", 1, "name").await.unwrap();
    let locales: Vec<&str> = names.iter().map(|t| t.locale.as_str()).collect();
    assert!(locales.contains(&"en"));
    assert!(locales.contains(&"es"));

    let app = pipeline.repo.get_app(1).await.unwrap().unwrap();
    assert_eq!(app.status, AppStatus::AwaitingReview);
    assert!(app.last_manifest_check_at.is_some());
}

#[tokio::test]
async fn test_cycle_runTwiceUnchanged_shouldBeIdempotent() {
    let pipeline = TestPipeline::serving(MANIFEST).unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::Incomplete).await.unwrap();

    pipeline.cycle(1).await;
    let versions = pipeline.repo.versions_for_app(1).await.unwrap().len();
    let files = pipeline.repo.files_for_app(1).await.unwrap().len();
    let retry = pipeline.repo.get_retry_state(1).await.unwrap();

    let report = pipeline.cycle(1).await;
    assert_eq!(report.unchanged, 1);

    assert_eq!(pipeline.repo.versions_for_app(1).await.unwrap().len(), versions);
    assert_eq!(pipeline.repo.files_for_app(1).await.unwrap().len(), files);

    let after = pipeline.repo.get_retry_state(1).await.unwrap();
    assert_eq!(after.failure_count, retry.failure_count);
    assert_eq!(after.revision, retry.revision);
    assert_eq!(after.last_attempt_at, retry.last_attempt_at);
}

#[tokio::test]
async fn test_cycle_withMatchingHash_shouldNeverValidateOrDiff() {
    let pipeline = TestPipeline::serving(MANIFEST).unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();
    seed_manifest(&pipeline.repo, 1, MANIFEST, FileStatus::ApprovedFull).await.unwrap();

    for _ in 0..3 {
        let report = pipeline.cycle(1).await;
        assert_eq!(report.unchanged, 1);
    }

    assert_eq!(pipeline.fetcher.call_count(), 3);
    assert_eq!(pipeline.validator.call_count(), 0);
    assert_eq!(pipeline.differ.call_count(), 0);
    assert_eq!(pipeline.repo.files_for_app(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cycle_withInvalidManifest_shouldNotifyWithReportAndNotCount() {
    let fetcher = MockFetcher::failing(FetchError::HttpStatus { status_code: 502 });
    let pipeline = TestPipeline::build(fetcher, MockValidator::passing()).unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();

    pipeline.cycle(1).await;
    pipeline.cycle(1).await;
    assert_eq!(pipeline.failure_count(1).await, 2);

    pipeline.fetcher.serve(r#"{"description": "A manifest without a name"}"#);
    let report = pipeline.cycle(1).await;

    assert_eq!(report.validation_failures, 1);
    assert_eq!(report.retries_scheduled, 0);
    assert_eq!(pipeline.failure_count(1).await, 2);

    let notices = pipeline.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].has_link);
    let report_id = notices[0].report_id.clone().unwrap();
    let stored = pipeline.repo.get_validation_report(&report_id).await.unwrap().unwrap();
    assert!(stored.report_json.contains("name"));

    // approved apps are also handed to a reviewer
    assert_eq!(pipeline.review_entry_count(1).await, 1);
    assert!(pipeline.repo.files_for_app(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cycle_withValidationFailureOnUnapprovedApp_shouldOnlyNotify() {
    let pipeline = TestPipeline::build(
        MockFetcher::serving(MANIFEST),
        MockValidator::rejecting("`developer` is required"),
    )
    .unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::AwaitingReview).await.unwrap();

    let report = pipeline.cycle(1).await;
    assert_eq!(report.validation_failures, 1);
    assert_eq!(pipeline.notifier.call_count(), 1);
    assert_eq!(pipeline.notifier.notices()[0].error_message, "`developer` is required");
    assert_eq!(pipeline.review_entry_count(1).await, 0);
    assert_eq!(pipeline.differ.call_count(), 0);
}

#[tokio::test]
async fn test_cycle_withValidatorUnavailable_shouldAbortWithoutSideEffects() {
    let validator = MockValidator::new(ValidatorBehavior::Unavailable);
    let pipeline = TestPipeline::build(MockFetcher::serving(MANIFEST), validator).unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();

    let report = pipeline.cycle(1).await;
    assert_eq!(report.errors, 1);
    assert_eq!(pipeline.failure_count(1).await, 0);
    assert_eq!(pipeline.notifier.call_count(), 0);
    assert!(pipeline.repo.files_for_app(1).await.unwrap().is_empty());

    pipeline.validator.set_behavior(ValidatorBehavior::Rules);
    let report = pipeline.cycle(1).await;
    assert_eq!(report.applied, 1);
}

#[tokio::test]
async fn test_cycle_forDisabledOrBlockedApp_shouldSkip() {
    let pipeline = TestPipeline::serving(MANIFEST).unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::Disabled).await.unwrap();
    seed_app(&pipeline.repo, 2, "MozillaBall", AppStatus::Blocked).await.unwrap();

    let report = pipeline.scheduler.run_batch(vec![1, 2]).await;
    assert_eq!(report.skipped, 2);
    assert_eq!(pipeline.fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_cycle_forUnknownApp_shouldCountAsSkipped() {
    let pipeline = TestPipeline::serving(MANIFEST).unwrap();

    let report = pipeline.cycle(404).await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors, 0);
}

#[tokio::test]
async fn test_runRetry_afterSuccess_shouldBeDropped() {
    let fetcher = MockFetcher::failing(FetchError::Timeout(30));
    let pipeline = TestPipeline::build(fetcher, MockValidator::passing()).unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();

    let report = pipeline.cycle(1).await;
    assert_eq!(report.retries_scheduled, 1);

    pipeline.fetcher.serve(MANIFEST);
    pipeline.cycle(1).await;
    assert_eq!(pipeline.failure_count(1).await, 0);
    let fetches = pipeline.fetcher.call_count();

    let report = pipeline
        .scheduler
        .run_retry(RetryPayload { app_id: 1, failure_count: 1 })
        .await;
    assert_eq!(report.retries_dropped, 1);
    assert_eq!(pipeline.fetcher.call_count(), fetches);
}

#[tokio::test]
async fn test_runRetry_whenStillCurrent_shouldRunTheCycle() {
    let fetcher = MockFetcher::failing(FetchError::Network("connection refused".into()));
    let pipeline = TestPipeline::build(fetcher, MockValidator::passing()).unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();

    pipeline.cycle(1).await;
    pipeline.fetcher.serve(MANIFEST);

    let report = pipeline
        .scheduler
        .run_retry(RetryPayload { app_id: 1, failure_count: 1 })
        .await;
    assert_eq!(report.applied, 1);
    assert_eq!(pipeline.failure_count(1).await, 0);
}
