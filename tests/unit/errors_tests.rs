/*!
 * Tests for error types and their classification
 */

use manifest_sync::errors::{AppError, FetchError, PipelineError};

#[test]
fn test_fetchError_kind_shouldClassifyEveryVariant() {
    assert_eq!(FetchError::Network("refused".into()).kind(), "network");
    assert_eq!(FetchError::Timeout(30).kind(), "timeout");
    assert_eq!(FetchError::HttpStatus { status_code: 404 }.kind(), "http-status");
    assert_eq!(FetchError::MalformedResponse("empty".into()).kind(), "malformed-response");
}

#[test]
fn test_fetchError_display_shouldMentionDetails() {
    assert_eq!(
        FetchError::HttpStatus { status_code: 503 }.to_string(),
        "Manifest server responded with HTTP 503"
    );
    assert!(FetchError::Timeout(30).to_string().contains("30 seconds"));
}

#[test]
fn test_pipelineError_fromAnyhow_shouldBePersistence() {
    let error: PipelineError = anyhow::anyhow!("disk full").context("Failed to insert file").into();
    match error {
        PipelineError::Persistence(message) => {
            assert!(message.contains("Failed to insert file"));
            assert!(message.contains("disk full"));
        }
        other => panic!("Expected a persistence error, got {:?}", other),
    }
}

#[test]
fn test_appError_fromLowerLayers_shouldWrap() {
    let error: AppError = FetchError::Timeout(5).into();
    assert!(matches!(error, AppError::Fetch(FetchError::Timeout(5))));

    let error: AppError = PipelineError::NotFound(9).into();
    assert_eq!(error.to_string(), "Pipeline error: App 9 not found");

    let error: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "conf.json").into();
    assert!(matches!(error, AppError::File(_)));
}
