/*!
 * Retry and escalation decisions.
 *
 * Fetch failures and validation failures are handled differently:
 * - a fetch failure is counted, retried after a fixed delay, reported to the
 *   developers once the count reaches `notify_after`, and handed to reviewers
 *   (approved apps only) once it reaches `escalate_after`, at which point the
 *   count starts over
 * - a validation failure is reported immediately with a link to the report,
 *   flagged for approved apps, never retried and never counted
 *
 * The controller is pure: the count comes from the persisted `RetryState` and
 * decisions come back as side-effect descriptors.
 */

use crate::app_config::RetryConfig;
use crate::database::models::{AppRecord, ReviewReason, RetryState};
use crate::errors::FetchError;
use crate::manifest::ValidationResult;

use super::effects::{RetryPayload, SideEffect};

/// Decision for one fetch failure
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailureDecision {
    /// Effects to execute
    pub effects: Vec<SideEffect>,
    /// Whether the persisted failure count must be reset
    pub reset_counter: bool,
}

/// Decides what happens after each cycle outcome
#[derive(Debug, Clone)]
pub struct RetryController {
    config: RetryConfig,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Decide after the `failure_count`-th consecutive fetch failure
    pub fn on_fetch_failure(&self, app: &AppRecord, failure_count: u32, error: &FetchError) -> FetchFailureDecision {
        if failure_count >= self.config.escalate_after {
            let mut effects = Vec::new();
            if app.status.is_approved() {
                effects.push(SideEffect::FlagForReview {
                    app_id: app.id,
                    reason: ReviewReason::ManifestUnreachable,
                    message: format!(
                        "The manifest at {} could not be fetched {} times in a row ({})",
                        app.manifest_url, failure_count, error
                    ),
                });
            }
            return FetchFailureDecision {
                effects,
                reset_counter: true,
            };
        }

        let mut effects = Vec::new();
        if failure_count == self.config.notify_after {
            effects.push(SideEffect::Notify {
                app_id: app.id,
                message: format!(
                    "Your manifest at {} could not be fetched: {}",
                    app.manifest_url, error
                ),
                has_link: false,
                report_id: None,
            });
        }

        effects.push(SideEffect::ScheduleRetry {
            payload: RetryPayload {
                app_id: app.id,
                failure_count,
            },
            delay: self.config.retry_delay(),
        });

        FetchFailureDecision {
            effects,
            reset_counter: false,
        }
    }

    /// Decide after the validator rejected a fetched manifest
    pub fn on_validation_failure(&self, app: &AppRecord, report_id: &str, result: &ValidationResult) -> Vec<SideEffect> {
        let reason = result
            .first_error()
            .unwrap_or("The manifest did not pass validation");

        let mut effects = vec![SideEffect::Notify {
            app_id: app.id,
            message: reason.to_string(),
            has_link: true,
            report_id: Some(report_id.to_string()),
        }];

        if app.status.is_approved() {
            effects.push(SideEffect::FlagForReview {
                app_id: app.id,
                reason: ReviewReason::InvalidManifest,
                message: format!(
                    "The manifest at {} failed validation with {} error(s): {}",
                    app.manifest_url, result.errors, reason
                ),
            });
        }

        effects
    }

    /// Whether a scheduled retry still matches the persisted state.
    /// A newer cycle that succeeded or failed again makes it stale.
    pub fn retry_is_current(payload: &RetryPayload, persisted: &RetryState) -> bool {
        persisted.app_id == payload.app_id && persisted.failure_count == payload.failure_count
    }
}
