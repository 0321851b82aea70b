/*!
 * External collaborators of the reconciliation pipeline.
 *
 * The pipeline only ever talks to these through the traits defined here:
 * - `Notifier`: templated failure emails to an app's developers
 * - `StorefrontSync`: identity and rating metadata pushes to the rating authority
 *
 * Implementations:
 * - `notifier::TemplateNotifier`: localized templates over a log or HTTP relay
 * - `storefront::HttpStorefrontSync`: JSON POST per rating body
 * - `mock`: recording doubles for tests
 */

pub mod notifier;
pub mod storefront;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::database::models::AppDeveloperRecord;

/// A failure notice for the developers of one app
#[derive(Debug, Clone, PartialEq)]
pub struct DeveloperNotice {
    pub app_id: i64,
    /// App name used in the message
    pub app_name: String,
    /// Listed developers; each gets one message in their own locale
    pub recipients: Vec<AppDeveloperRecord>,
    /// Error description
    pub error_message: String,
    /// Whether the message links to a validation report
    pub has_link: bool,
    /// Stored validation report the link points at
    pub report_id: Option<String>,
}

/// Sends failure emails to developers
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    /// Deliver one notice to every recipient
    async fn notify(&self, notice: &DeveloperNotice) -> anyhow::Result<()>;
}

/// Metadata pushed to the rating authority for one rating body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorefrontUpdate {
    pub submission_id: String,
    pub security_code: String,
    /// App name
    pub title: String,
    /// Developer name
    pub company: String,
    /// Date of first nomination (YYYY-MM-DD)
    pub release_date: String,
    /// Rating body, e.g. "PEGI"
    pub rating_system: String,
    pub rating: String,
    /// Comma-separated content descriptors
    pub descriptors: String,
    /// Comma-separated interactive elements
    pub interactive_elements: String,
}

/// Pushes identity and rating metadata to the rating authority
#[async_trait]
pub trait StorefrontSync: Send + Sync + Debug {
    /// Push the metadata of one rating body
    async fn push(&self, update: &StorefrontUpdate) -> anyhow::Result<()>;
}
