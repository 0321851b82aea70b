/*!
 * Per-app reconciliation cycle.
 *
 * Stages run strictly in order: fetch, hash check, validate, diff, mutate
 * (which recomputes the status), then the side effects are planned. The
 * cycle itself only writes bookkeeping and canonical records; the returned
 * `CycleOutcome` lists the effects for the caller to execute.
 */

use log::{debug, error, info, warn};
use std::sync::Arc;

use super::effects::{RetryPayload, SideEffect};
use super::mutator::{AppliedMutation, MutationOutcome, MutationRequest, VersionMutator};
use super::retry::RetryController;
use crate::app_config::RetryConfig;
use crate::database::models::{AppRecord, AppStatus, ReviewReason};
use crate::database::Repository;
use crate::errors::{FetchError, PipelineError};
use crate::manifest::{
    content_hash, DiffFallback, Manifest, ManifestDiff, ManifestFetcher, ManifestValidator, ValidationContext,
    ValidationResult,
};

/// How a cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleResult {
    /// Fetched hash equals the stored one; nothing else ran
    Unchanged,
    /// The manifest was applied
    Applied(AppliedMutation),
    /// A concurrent cycle stored the same manifest first
    AlreadyApplied,
    /// The fetch failed; `failure_count` is the persisted count after this failure
    FetchFailed { error: FetchError, failure_count: u32 },
    /// The validator rejected the manifest
    ValidationFailed { report_id: String, errors: u32 },
    /// Disabled and blocked apps are not reconciled
    Skipped(AppStatus),
    /// A scheduled retry that no longer matches the persisted state
    RetryDropped,
}

/// Result of one cycle plus the effects to execute
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub app_id: i64,
    pub result: CycleResult,
    pub effects: Vec<SideEffect>,
}

impl CycleOutcome {
    fn quiet(app_id: i64, result: CycleResult) -> Self {
        Self {
            app_id,
            result,
            effects: Vec::new(),
        }
    }
}

/// Runs reconciliation cycles
#[derive(Clone)]
pub struct Reconciler {
    repo: Repository,
    fetcher: Arc<dyn ManifestFetcher>,
    validator: Arc<dyn ManifestValidator>,
    differ: Arc<dyn ManifestDiff>,
    mutator: VersionMutator,
    retry: RetryController,
}

impl Reconciler {
    pub fn new(
        repo: Repository,
        fetcher: Arc<dyn ManifestFetcher>,
        validator: Arc<dyn ManifestValidator>,
        differ: Arc<dyn ManifestDiff>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            mutator: VersionMutator::new(repo.clone()),
            repo,
            fetcher,
            validator,
            differ,
            retry: RetryController::new(retry_config),
        }
    }

    /// Run one cycle for an app
    ///
    /// # Returns
    /// * `Ok(CycleOutcome)` - Any fetch or validation outcome, including failures
    /// * `Err(PipelineError)` - Persistence or validator errors; the cycle is aborted
    pub async fn reconcile(&self, app_id: i64) -> Result<CycleOutcome, PipelineError> {
        let app = self
            .repo
            .get_app(app_id)
            .await?
            .ok_or(PipelineError::NotFound(app_id))?;

        if matches!(app.status, AppStatus::Disabled | AppStatus::Blocked) {
            debug!("App {} is {}, skipping", app_id, app.status);
            return Ok(CycleOutcome::quiet(app_id, CycleResult::Skipped(app.status)));
        }

        self.repo.touch_manifest_check(app_id).await?;

        let fetched = match self.fetcher.fetch(&app.manifest_url).await {
            Ok(fetched) => fetched,
            Err(error) => return self.handle_fetch_failure(&app, error).await,
        };

        let hash = content_hash(&fetched.body);
        let latest_file = self.repo.latest_file(app_id).await?;
        if latest_file.is_some_and(|f| f.hash == hash) {
            debug!("App {}: manifest unchanged ({})", app_id, hash);
            self.record_success(app_id).await?;
            return Ok(CycleOutcome::quiet(app_id, CycleResult::Unchanged));
        }

        let context = ValidationContext {
            app_id,
            manifest_url: app.manifest_url.clone(),
            is_packaged: app.is_packaged,
        };
        let validation = self
            .validator
            .validate(&fetched.body, &context)
            .await
            .map_err(|e| PipelineError::Integration(format!("Validator failed for app {}: {:#}", app_id, e)))?;

        if !validation.is_valid() {
            return self.handle_validation_failure(&app, validation).await;
        }

        let manifest = match Manifest::from_slice(&fetched.body) {
            Ok(manifest) => manifest,
            Err(e) => {
                // The validator accepted a document the typed model cannot read
                let mut validation = validation;
                validation.error(1, format!("The manifest could not be parsed: {}", e));
                return self.handle_validation_failure(&app, validation).await;
            }
        };

        let old_manifest = self.stored_manifest(app_id).await?;
        let changes = self
            .differ
            .diff(old_manifest.as_ref(), &manifest, &DiffFallback::from_app(&app));

        let outcome = self
            .mutator
            .apply(MutationRequest {
                app_id,
                hash,
                manifest,
                changes,
            })
            .await
            .inspect_err(|e| error!("App {}: failed to apply manifest: {}", app_id, e))?;

        self.record_success(app_id).await?;

        match outcome {
            MutationOutcome::AlreadyApplied => Ok(CycleOutcome::quiet(app_id, CycleResult::AlreadyApplied)),
            MutationOutcome::Applied(applied) => {
                let effects = Self::plan_change_effects(&app, &applied);
                Ok(CycleOutcome {
                    app_id,
                    result: CycleResult::Applied(applied),
                    effects,
                })
            }
        }
    }

    /// Run a scheduled retry if it still matches the persisted state
    pub async fn run_retry(&self, payload: RetryPayload) -> Result<CycleOutcome, PipelineError> {
        let persisted = self.repo.get_retry_state(payload.app_id).await?;

        if !RetryController::retry_is_current(&payload, &persisted) {
            debug!(
                "App {}: dropping retry #{} (persisted count is {})",
                payload.app_id, payload.failure_count, persisted.failure_count
            );
            return Ok(CycleOutcome::quiet(payload.app_id, CycleResult::RetryDropped));
        }

        self.reconcile(payload.app_id).await
    }

    /// Effects of an applied change. Only apps that were already approved
    /// before this cycle are flagged or pushed to the storefront.
    fn plan_change_effects(app: &AppRecord, applied: &AppliedMutation) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if !app.status.is_approved() {
            return effects;
        }

        let changes = &applied.changes;
        if changes.requires_review() {
            effects.push(SideEffect::FlagForReview {
                app_id: app.id,
                reason: ReviewReason::ManifestChange,
                message: changes.review_message(),
            });
        }

        let has_credentials = app.iarc_submission_id.is_some() && app.iarc_security_code.is_some();
        if changes.affects_identity() && has_credentials {
            effects.push(SideEffect::StorefrontSync { app_id: app.id });
        }

        effects
    }

    async fn handle_fetch_failure(&self, app: &AppRecord, error: FetchError) -> Result<CycleOutcome, PipelineError> {
        let state = self.repo.record_fetch_failure(app.id).await?;
        warn!(
            "App {}: fetch failed ({}), {} consecutive failure(s): {}",
            app.id,
            error.kind(),
            state.failure_count,
            error
        );

        let decision = self.retry.on_fetch_failure(app, state.failure_count, &error);

        if decision.reset_counter && !self.repo.reset_failures_if_unchanged(app.id, state.revision).await? {
            debug!("App {}: failure count moved on concurrently, not resetting", app.id);
        }

        Ok(CycleOutcome {
            app_id: app.id,
            result: CycleResult::FetchFailed {
                error,
                failure_count: state.failure_count,
            },
            effects: decision.effects,
        })
    }

    async fn handle_validation_failure(
        &self,
        app: &AppRecord,
        validation: ValidationResult,
    ) -> Result<CycleOutcome, PipelineError> {
        let report = self.repo.store_validation_report(app.id, validation.to_json()?).await?;
        info!(
            "App {}: manifest failed validation with {} error(s), report {}",
            app.id, validation.errors, report.id
        );

        let effects = self.retry.on_validation_failure(app, &report.id, &validation);

        Ok(CycleOutcome {
            app_id: app.id,
            result: CycleResult::ValidationFailed {
                report_id: report.id,
                errors: validation.errors,
            },
            effects,
        })
    }

    async fn stored_manifest(&self, app_id: i64) -> Result<Option<Manifest>, PipelineError> {
        let Some(json) = self
            .repo
            .latest_version(app_id)
            .await?
            .and_then(|v| v.manifest_json)
        else {
            return Ok(None);
        };

        match Manifest::from_json(&json) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(e) => {
                warn!("App {}: stored manifest is unreadable, diffing against stored fields: {}", app_id, e);
                Ok(None)
            }
        }
    }

    async fn record_success(&self, app_id: i64) -> Result<(), PipelineError> {
        let state = self.repo.get_retry_state(app_id).await?;
        if state.failure_count == 0 {
            return Ok(());
        }

        if self.repo.reset_failures_if_unchanged(app_id, state.revision).await? {
            info!("App {}: manifest reachable again after {} failure(s)", app_id, state.failure_count);
        } else {
            debug!("App {}: failure recorded concurrently, keeping the newer count", app_id);
        }
        Ok(())
    }
}
