/*!
 * Side effects of a reconciliation cycle.
 *
 * Stages never notify, flag or push anything themselves. They return
 * `SideEffect` descriptors which the `EffectExecutor` runs once the cycle's
 * writes are committed. Retries are handed back to the caller, which owns
 * the timers.
 */

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use super::review_queue::ReviewEscalationQueue;
use crate::database::models::ReviewReason;
use crate::database::Repository;
use crate::errors::PipelineError;
use crate::integrations::storefront::updates_for;
use crate::integrations::{DeveloperNotice, Notifier, StorefrontSync};

/// Everything a scheduled retry needs; nothing else about the app is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPayload {
    pub app_id: i64,
    /// Failure count at the time the retry was scheduled
    pub failure_count: u32,
}

/// An effect requested by a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Email the app's developers
    Notify {
        app_id: i64,
        message: String,
        has_link: bool,
        report_id: Option<String>,
    },
    /// Put the app in front of a reviewer
    FlagForReview {
        app_id: i64,
        reason: ReviewReason,
        message: String,
    },
    /// Push identity metadata to the rating authority
    StorefrontSync { app_id: i64 },
    /// Run the cycle again after `delay`
    ScheduleRetry { payload: RetryPayload, delay: Duration },
}

/// Counts of what an execution did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub notifications: usize,
    pub flags: usize,
    pub storefront_pushes: usize,
    /// Notifier or storefront calls that failed
    pub integration_failures: usize,
    /// Retries for the caller to schedule
    pub retries: Vec<(RetryPayload, Duration)>,
}

/// Runs side effects against the real collaborators
#[derive(Clone)]
pub struct EffectExecutor {
    repo: Repository,
    queue: ReviewEscalationQueue,
    notifier: Arc<dyn Notifier>,
    storefront: Arc<dyn StorefrontSync>,
}

impl EffectExecutor {
    pub fn new(repo: Repository, notifier: Arc<dyn Notifier>, storefront: Arc<dyn StorefrontSync>) -> Self {
        Self {
            queue: ReviewEscalationQueue::new(repo.clone()),
            repo,
            notifier,
            storefront,
        }
    }

    /// Review queue the executor writes to
    pub fn queue(&self) -> &ReviewEscalationQueue {
        &self.queue
    }

    /// Execute effects in order.
    ///
    /// Notifier and storefront failures are logged and counted; they never undo
    /// the cycle. Review queue failures are persistence errors and abort.
    pub async fn execute(&self, effects: &[SideEffect]) -> Result<ExecutionReport, PipelineError> {
        let mut report = ExecutionReport::default();

        for effect in effects {
            match effect {
                SideEffect::Notify {
                    app_id,
                    message,
                    has_link,
                    report_id,
                } => match self.notify(*app_id, message, *has_link, report_id.clone()).await {
                    Ok(()) => report.notifications += 1,
                    Err(e) => {
                        warn!("App {}: notification failed: {}", app_id, e);
                        report.integration_failures += 1;
                    }
                },
                SideEffect::FlagForReview { app_id, reason, message } => {
                    self.queue.flag(*app_id, *reason, message).await?;
                    report.flags += 1;
                }
                SideEffect::StorefrontSync { app_id } => {
                    let (pushed, failed) = self.sync_storefront(*app_id).await?;
                    report.storefront_pushes += pushed;
                    report.integration_failures += failed;
                }
                SideEffect::ScheduleRetry { payload, delay } => {
                    debug!(
                        "App {}: retry #{} in {:?}",
                        payload.app_id, payload.failure_count, delay
                    );
                    report.retries.push((*payload, *delay));
                }
            }
        }

        Ok(report)
    }

    async fn notify(
        &self,
        app_id: i64,
        message: &str,
        has_link: bool,
        report_id: Option<String>,
    ) -> Result<(), PipelineError> {
        let app = self
            .repo
            .get_app(app_id)
            .await?
            .ok_or(PipelineError::NotFound(app_id))?;
        let recipients = self.repo.developers_for(app_id).await?;

        let notice = DeveloperNotice {
            app_id,
            app_name: app.name,
            recipients,
            error_message: message.to_string(),
            has_link,
            report_id,
        };

        self.notifier
            .notify(&notice)
            .await
            .map_err(|e| PipelineError::Integration(format!("{:#}", e)))
    }

    async fn sync_storefront(&self, app_id: i64) -> Result<(usize, usize), PipelineError> {
        let app = self
            .repo
            .get_app(app_id)
            .await?
            .ok_or(PipelineError::NotFound(app_id))?;
        let version = self.repo.latest_version(app_id).await?;
        let ratings = self.repo.content_ratings_for(app_id).await?;

        let mut pushed = 0;
        let mut failed = 0;
        for update in updates_for(&app, version.as_ref(), &ratings) {
            match self.storefront.push(&update).await {
                Ok(()) => pushed += 1,
                Err(e) => {
                    warn!(
                        "App {}: storefront push for {} failed: {:#}",
                        app_id, update.rating_system, e
                    );
                    failed += 1;
                }
            }
        }

        Ok((pushed, failed))
    }
}
