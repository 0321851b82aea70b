/*!
 * Mock collaborators for testing.
 *
 * Every mock counts its calls so tests can assert how often a pipeline stage
 * was reached:
 * - `MockFetcher::serving(body)` / `MockFetcher::failing(error)` - scripted fetches
 * - `MockValidator::passing()` / `MockValidator::rejecting(message)` - fixed verdicts
 * - `CountingDiffer` - the real differ plus a call counter
 * - `RecordingNotifier` / `RecordingStorefront` - keep everything they receive
 */

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{DeveloperNotice, Notifier, StorefrontSync, StorefrontUpdate};
use crate::errors::FetchError;
use crate::manifest::differ::{diff_manifests, ChangeSet, DiffFallback, ManifestDiff};
use crate::manifest::fetcher::{FetchedManifest, ManifestFetcher};
use crate::manifest::model::Manifest;
use crate::manifest::validator::{ManifestValidator, RulesValidator, ValidationContext, ValidationResult};

/// Scripted manifest fetcher
#[derive(Debug, Clone)]
pub struct MockFetcher {
    /// Response returned by the next fetch
    response: Arc<Mutex<Result<Bytes, FetchError>>>,
    /// Number of fetches
    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    /// A fetcher that always returns `body`
    pub fn serving(body: impl Into<Bytes>) -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok(body.into()))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A fetcher that always fails with `error`
    pub fn failing(error: FetchError) -> Self {
        Self {
            response: Arc::new(Mutex::new(Err(error))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serve `body` from now on
    pub fn serve(&self, body: impl Into<Bytes>) {
        *self.response.lock() = Ok(body.into());
    }

    /// Fail with `error` from now on
    pub fn fail(&self, error: FetchError) {
        *self.response.lock() = Err(error);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedManifest, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self.response.lock().clone()?;
        Ok(FetchedManifest {
            url: url.to_string(),
            body,
            content_type: Some("application/x-web-app-manifest+json".to_string()),
        })
    }
}

/// Behavior mode for the mock validator
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatorBehavior {
    /// Delegate to the built-in rules
    Rules,
    /// Always fail with one tier 2 error
    Rejecting(String),
    /// Return `Err`, as an unreachable validator service would
    Unavailable,
}

/// Counting validator
#[derive(Debug, Clone)]
pub struct MockValidator {
    behavior: Arc<Mutex<ValidatorBehavior>>,
    calls: Arc<AtomicUsize>,
}

impl MockValidator {
    pub fn new(behavior: ValidatorBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Validate with the built-in rules
    pub fn passing() -> Self {
        Self::new(ValidatorBehavior::Rules)
    }

    /// Reject every manifest with `message`
    pub fn rejecting(message: &str) -> Self {
        Self::new(ValidatorBehavior::Rejecting(message.to_string()))
    }

    pub fn set_behavior(&self, behavior: ValidatorBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestValidator for MockValidator {
    async fn validate(&self, body: &[u8], context: &ValidationContext) -> anyhow::Result<ValidationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().clone();

        match behavior {
            ValidatorBehavior::Rules => Ok(RulesValidator::check(body, context)),
            ValidatorBehavior::Rejecting(message) => {
                let mut result = ValidationResult::default();
                result.error(2, message);
                Ok(result)
            }
            ValidatorBehavior::Unavailable => Err(anyhow::anyhow!("Validator service unavailable")),
        }
    }
}

/// The real differ plus a call counter
#[derive(Debug, Clone, Default)]
pub struct CountingDiffer {
    calls: Arc<AtomicUsize>,
}

impl CountingDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ManifestDiff for CountingDiffer {
    fn diff(&self, old: Option<&Manifest>, new: &Manifest, fallback: &DiffFallback) -> ChangeSet {
        self.calls.fetch_add(1, Ordering::SeqCst);
        diff_manifests(old, new, fallback)
    }
}

/// Notifier that keeps every notice it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<DeveloperNotice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<DeveloperNotice> {
        self.notices.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.notices.lock().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &DeveloperNotice) -> anyhow::Result<()> {
        self.notices.lock().push(notice.clone());
        Ok(())
    }
}

/// Storefront client that keeps every update it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingStorefront {
    updates: Arc<Mutex<Vec<StorefrontUpdate>>>,
    failing: bool,
}

impl RecordingStorefront {
    pub fn new() -> Self {
        Self::default()
    }

    /// A storefront that records and then rejects every push
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn updates(&self) -> Vec<StorefrontUpdate> {
        self.updates.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.updates.lock().len()
    }
}

#[async_trait]
impl StorefrontSync for RecordingStorefront {
    async fn push(&self, update: &StorefrontUpdate) -> anyhow::Result<()> {
        self.updates.lock().push(update.clone());
        if self.failing {
            return Err(anyhow::anyhow!("Storefront rejected the update"));
        }
        Ok(())
    }
}
