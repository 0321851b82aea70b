/*!
 * Tests for the notifier and storefront clients against a local server
 */

use manifest_sync::app_config::{MailRelayKind, NotifierConfig, StorefrontConfig};
use manifest_sync::database::models::AppDeveloperRecord;
use manifest_sync::integrations::notifier::TemplateNotifier;
use manifest_sync::integrations::storefront::HttpStorefrontSync;
use manifest_sync::integrations::{DeveloperNotice, Notifier, StorefrontSync, StorefrontUpdate};

use crate::common::{HttpStub, StubResponse};

fn notice(recipients: Vec<AppDeveloperRecord>) -> DeveloperNotice {
    DeveloperNotice {
        app_id: 3,
        app_name: "MozillaBall".to_string(),
        recipients,
        error_message: "The manifest must declare a non-empty `name`".to_string(),
        has_link: true,
        report_id: Some("report-1".to_string()),
    }
}

fn developer(email: &str, locale: &str) -> AppDeveloperRecord {
    AppDeveloperRecord {
        app_id: 3,
        email: email.to_string(),
        locale: locale.to_string(),
    }
}

fn http_notifier(endpoint: String) -> TemplateNotifier {
    TemplateNotifier::new(&NotifierConfig {
        relay: MailRelayKind::Http,
        endpoint,
        ..NotifierConfig::default()
    })
    .unwrap()
}

fn update() -> StorefrontUpdate {
    StorefrontUpdate {
        submission_id: "sub-1".to_string(),
        security_code: "code-1".to_string(),
        title: "MozillaBall Ultimate".to_string(),
        company: "Mozilla Labs".to_string(),
        release_date: "2014-03-01".to_string(),
        rating_system: "PEGI".to_string(),
        rating: "12".to_string(),
        descriptors: "Violence".to_string(),
        interactive_elements: String::new(),
    }
}

#[tokio::test]
async fn test_notify_withHttpRelay_shouldPostOneLocalizedMessagePerRecipient() {
    let stub = HttpStub::start(StubResponse::ok("{}")).await.unwrap();
    let notifier = http_notifier(stub.url("/send"));

    notifier
        .notify(&notice(vec![developer("a@example.com", "fr-FR"), developer("b@example.com", "ja")]))
        .await
        .unwrap();

    assert_eq!(stub.request_count(), 2);
    let requests = stub.requests();
    let french = requests.iter().find(|r| r.contains("a@example.com")).unwrap();
    assert!(french.starts_with("POST /send"));
    assert!(french.contains("manifeste de MozillaBall"));
    assert!(french.contains("/report-1"));

    let fallback = requests.iter().find(|r| r.contains("b@example.com")).unwrap();
    assert!(fallback.contains("Problem with the manifest of MozillaBall"));
}

#[tokio::test]
async fn test_notify_withRelayError_shouldFail() {
    let stub = HttpStub::start(StubResponse::status(500)).await.unwrap();
    let notifier = http_notifier(stub.url("/send"));

    let result = notifier.notify(&notice(vec![developer("a@example.com", "en")])).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_notify_withoutRecipients_shouldSendNothing() {
    let stub = HttpStub::start(StubResponse::ok("{}")).await.unwrap();
    let notifier = http_notifier(stub.url("/send"));

    notifier.notify(&notice(Vec::new())).await.unwrap();
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn test_push_whenEnabled_shouldPostCamelCaseJson() {
    let stub = HttpStub::start(StubResponse::ok("{}")).await.unwrap();
    let storefront = HttpStorefrontSync::new(&StorefrontConfig {
        enabled: true,
        endpoint: stub.url("/storefront"),
        ..StorefrontConfig::default()
    })
    .unwrap();

    storefront.push(&update()).await.unwrap();

    assert_eq!(stub.request_count(), 1);
    let request = &stub.requests()[0];
    assert!(request.contains("\"submissionId\":\"sub-1\""));
    assert!(request.contains("\"title\":\"MozillaBall Ultimate\""));
}

#[tokio::test]
async fn test_push_whenRejected_shouldFail() {
    let stub = HttpStub::start(StubResponse::status(400)).await.unwrap();
    let storefront = HttpStorefrontSync::new(&StorefrontConfig {
        enabled: true,
        endpoint: stub.url("/storefront"),
        ..StorefrontConfig::default()
    })
    .unwrap();

    assert!(storefront.push(&update()).await.is_err());
}

#[tokio::test]
async fn test_push_whenDisabled_shouldNotCallOut() {
    let stub = HttpStub::start(StubResponse::ok("{}")).await.unwrap();
    let storefront = HttpStorefrontSync::new(&StorefrontConfig {
        enabled: false,
        endpoint: stub.url("/storefront"),
        ..StorefrontConfig::default()
    })
    .unwrap();

    storefront.push(&update()).await.unwrap();
    assert_eq!(stub.request_count(), 0);
}
