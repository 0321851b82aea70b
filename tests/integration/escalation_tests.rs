/*!
 * Review queue and storefront escalation when an approved manifest changes
 */

use manifest_sync::database::models::{AppDeveloperRecord, AppRecord, AppStatus, ContentRatingRecord, FileStatus, ReviewReason};
use manifest_sync::database::Repository;

use crate::common::{seed_app, seed_manifest, TestPipeline};

const LOCALIZED: &str = r#"{"name": "Ball", "default_locale": "en", "locales": {"de": {"name": "Ball DE"}, "fr": {"name": "Balle"}}}"#;

async fn seed_rated_app(repo: &Repository, id: i64, status: AppStatus, file_status: FileStatus) {
    let mut app = AppRecord::new(
        id,
        format!("https://apps.example.com/{}/manifest.webapp", id),
        "MozillaBall".to_string(),
        "dev@example.com".to_string(),
        "en".to_string(),
    )
    .with_iarc("submission-1", "security-1");
    app.status = status;
    repo.create_app(&app).await.unwrap();

    repo.upsert_content_rating(ContentRatingRecord {
        app_id: id,
        rating_body: "PEGI".to_string(),
        rating: "12".to_string(),
        descriptors: vec!["Violence".to_string()],
    })
    .await
    .unwrap();
    repo.add_developer(AppDeveloperRecord {
        app_id: id,
        email: "dev@example.com".to_string(),
        locale: "en".to_string(),
    })
    .await
    .unwrap();

    seed_manifest(repo, id, r#"{"name": "MozillaBall"}"#, file_status).await.unwrap();
}

#[tokio::test]
async fn test_localeChange_removalOnly_shouldNotFlag() {
    let pipeline = TestPipeline::serving(r#"{"name": "Ball", "default_locale": "en", "locales": {"fr": {"name": "Balle"}}}"#)
        .unwrap();
    seed_app(&pipeline.repo, 1, "Ball", AppStatus::ApprovedFull).await.unwrap();
    seed_manifest(&pipeline.repo, 1, LOCALIZED, FileStatus::ApprovedFull).await.unwrap();

    let report = pipeline.cycle(1).await;
    assert_eq!(report.applied, 1);
    assert_eq!(pipeline.review_entry_count(1).await, 0);

    let versions = pipeline.repo.versions_for_app(1).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].supported_locales, vec!["en".to_string(), "fr".to_string()]);
}

#[tokio::test]
async fn test_localeChange_addedName_shouldFlagOnce() {
    let pipeline = TestPipeline::serving(
        r#"{"name": "Ball", "default_locale": "en", "locales": {"de": {"name": "Ball DE"}, "fr": {"name": "Balle"}, "es": {"name": "Pelota"}}}"#,
    )
    .unwrap();
    seed_app(&pipeline.repo, 1, "Ball", AppStatus::ApprovedFull).await.unwrap();
    seed_manifest(&pipeline.repo, 1, LOCALIZED, FileStatus::ApprovedFull).await.unwrap();

    pipeline.cycle(1).await;

    let entries = pipeline.repo.review_entries_for(1).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason_code, ReviewReason::ManifestChange);
    assert!(entries[0].message.contains("es"));

    let names = pipeline.repo.translations_for("app", 1, "name").await.unwrap();
    assert!(names.iter().any(|t| t.locale == "es" && t.text == "Pelota"));
}

#[tokio::test]
async fn test_localeChange_updatedName_shouldFlagOnce() {
    let pipeline = TestPipeline::serving(
        r#"{"name": "Ball", "default_locale": "en", "locales": {"de": {"name": "Ball DE"}, "fr": {"name": "Le Ballon"}}}"#,
    )
    .unwrap();
    seed_app(&pipeline.repo, 1, "Ball", AppStatus::ApprovedFull).await.unwrap();
    seed_manifest(&pipeline.repo, 1, LOCALIZED, FileStatus::ApprovedFull).await.unwrap();

    pipeline.cycle(1).await;

    let entries = pipeline.repo.review_entries_for(1).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("Le Ballon"));

    let app = pipeline.repo.get_app(1).await.unwrap().unwrap();
    assert_eq!(app.status, AppStatus::ApprovedFull);
}

#[tokio::test]
async fn test_nameChange_onApprovedFullApp_shouldFlagAndSyncStorefront() {
    let pipeline = TestPipeline::serving(r#"{"name": "MozillaBall Ultimate"}"#).unwrap();
    seed_rated_app(&pipeline.repo, 1, AppStatus::ApprovedFull, FileStatus::ApprovedFull).await;

    let report = pipeline.cycle(1).await;
    assert_eq!(report.applied, 1);
    assert_eq!(report.flags, 1);
    assert_eq!(report.storefront_pushes, 1);

    let entries = pipeline.repo.review_entries_for(1).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("\"MozillaBall\" to \"MozillaBall Ultimate\""));

    let updates = pipeline.storefront.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].title, "MozillaBall Ultimate");
    assert_eq!(updates[0].submission_id, "submission-1");
    assert_eq!(updates[0].rating_system, "PEGI");
    assert_eq!(updates[0].release_date, "2014-03-01");

    let app = pipeline.repo.get_app(1).await.unwrap().unwrap();
    assert_eq!(app.name, "MozillaBall Ultimate");
    assert_eq!(app.status, AppStatus::ApprovedFull);

    // hosted apps keep a single version; the new file inherits its status
    assert_eq!(pipeline.repo.versions_for_app(1).await.unwrap().len(), 1);
    let latest = pipeline.repo.latest_file(1).await.unwrap().unwrap();
    assert_eq!(latest.status, FileStatus::ApprovedFull);
}

#[tokio::test]
async fn test_nameChange_onIncompleteApp_shouldNeitherFlagNorSync() {
    let pipeline = TestPipeline::serving(r#"{"name": "MozillaBall Ultimate"}"#).unwrap();
    seed_rated_app(&pipeline.repo, 1, AppStatus::Incomplete, FileStatus::Pending).await;

    let report = pipeline.cycle(1).await;
    assert_eq!(report.applied, 1);
    assert_eq!(report.flags, 0);
    assert_eq!(pipeline.review_entry_count(1).await, 0);
    assert_eq!(pipeline.storefront.call_count(), 0);

    let app = pipeline.repo.get_app(1).await.unwrap().unwrap();
    assert_eq!(app.name, "MozillaBall Ultimate");
}

#[tokio::test]
async fn test_nameChange_withoutRatingCredentials_shouldFlagButNotSync() {
    let pipeline = TestPipeline::serving(r#"{"name": "MozillaBall Ultimate"}"#).unwrap();
    seed_app(&pipeline.repo, 1, "MozillaBall", AppStatus::ApprovedFull).await.unwrap();
    seed_manifest(&pipeline.repo, 1, r#"{"name": "MozillaBall"}"#, FileStatus::ApprovedFull)
        .await
        .unwrap();

    pipeline.cycle(1).await;

    assert_eq!(pipeline.review_entry_count(1).await, 1);
    assert_eq!(pipeline.storefront.call_count(), 0);
}

#[tokio::test]
async fn test_developerChange_onApprovedApp_shouldFlagOnceAndSync() {
    let pipeline = TestPipeline::serving(r#"{"name": "MozillaBall", "developer": {"name": "Evil Corp"}}"#).unwrap();
    seed_rated_app(&pipeline.repo, 1, AppStatus::ApprovedFull, FileStatus::ApprovedFull).await;

    let report = pipeline.cycle(1).await;
    assert_eq!(report.flags, 1);
    assert_eq!(report.storefront_pushes, 1);
    assert_eq!(pipeline.storefront.updates()[0].company, "Evil Corp");

    let entries = pipeline.repo.pending_review_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("Developer name changed"), "{}", entries[0].message);
}

#[tokio::test]
async fn test_developerChange_onIncompleteApp_shouldNotFlag() {
    let pipeline = TestPipeline::serving(r#"{"name": "MozillaBall", "developer": {"name": "Evil Corp"}}"#).unwrap();
    seed_rated_app(&pipeline.repo, 1, AppStatus::Incomplete, FileStatus::Pending).await;

    let report = pipeline.cycle(1).await;
    assert_eq!(report.flags, 0);
    assert_eq!(report.storefront_pushes, 0);
}

#[tokio::test]
async fn test_repeatedFlags_shouldNotBeDeduplicated() {
    let pipeline = TestPipeline::serving(r#"{"name": "Ball 2"}"#).unwrap();
    seed_app(&pipeline.repo, 1, "Ball", AppStatus::ApprovedFull).await.unwrap();
    seed_manifest(&pipeline.repo, 1, r#"{"name": "Ball"}"#, FileStatus::ApprovedFull).await.unwrap();

    pipeline.cycle(1).await;
    pipeline.fetcher.serve(r#"{"name": "Ball 3"}"#);
    pipeline.cycle(1).await;

    assert_eq!(pipeline.review_entry_count(1).await, 2);
    assert_eq!(pipeline.repo.pending_review_entries().await.unwrap().len(), 2);
}
