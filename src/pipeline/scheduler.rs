/*!
 * Periodic batch dispatch.
 *
 * Each pass lists the reconcilable apps, splits them into batches and runs
 * every batch on a bounded worker pool. Each app id appears at most once per
 * batch. Retries requested by a cycle are written to the database with a due
 * time and picked up by whichever scheduler polls next; the retry re-checks
 * the persisted state before running. No per-app state is kept here.
 */

use anyhow::Result;
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time::MissedTickBehavior;

use super::effects::{EffectExecutor, ExecutionReport, RetryPayload};
use super::reconciler::{CycleOutcome, CycleResult, Reconciler};
use crate::app_config::{Config, SchedulerConfig};
use crate::database::models::ScheduledRetry;
use crate::database::Repository;
use crate::errors::PipelineError;
use crate::integrations::notifier::TemplateNotifier;
use crate::integrations::storefront::HttpStorefrontSync;
use crate::manifest::{HttpManifestFetcher, ManifestDiffer, RulesValidator};

/// Tally of one or more batches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub unchanged: usize,
    pub applied: usize,
    pub fetch_failures: usize,
    pub validation_failures: usize,
    pub skipped: usize,
    pub retries_dropped: usize,
    /// Cycles aborted by persistence or validator errors
    pub errors: usize,
    pub notifications: usize,
    pub flags: usize,
    pub storefront_pushes: usize,
    pub retries_scheduled: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &CycleOutcome, execution: &ExecutionReport) {
        self.processed += 1;
        match outcome.result {
            CycleResult::Unchanged => self.unchanged += 1,
            CycleResult::Applied(_) | CycleResult::AlreadyApplied => self.applied += 1,
            CycleResult::FetchFailed { .. } => self.fetch_failures += 1,
            CycleResult::ValidationFailed { .. } => self.validation_failures += 1,
            CycleResult::Skipped(_) => self.skipped += 1,
            CycleResult::RetryDropped => self.retries_dropped += 1,
        }
        self.notifications += execution.notifications;
        self.flags += execution.flags;
        self.storefront_pushes += execution.storefront_pushes;
        self.retries_scheduled += execution.retries.len();
    }

    fn merge(&mut self, other: BatchReport) {
        self.processed += other.processed;
        self.unchanged += other.unchanged;
        self.applied += other.applied;
        self.fetch_failures += other.fetch_failures;
        self.validation_failures += other.validation_failures;
        self.skipped += other.skipped;
        self.retries_dropped += other.retries_dropped;
        self.errors += other.errors;
        self.notifications += other.notifications;
        self.flags += other.flags;
        self.storefront_pushes += other.storefront_pushes;
        self.retries_scheduled += other.retries_scheduled;
    }
}

/// Dispatches reconciliation cycles
pub struct Scheduler {
    repo: Repository,
    reconciler: Reconciler,
    executor: EffectExecutor,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(repo: Repository, reconciler: Reconciler, executor: EffectExecutor, config: SchedulerConfig) -> Self {
        Self {
            repo,
            reconciler,
            executor,
            config,
        }
    }

    /// Wire the production collaborators from configuration
    pub fn from_config(config: &Config, repo: Repository) -> Result<Self> {
        let fetcher = Arc::new(HttpManifestFetcher::new(&config.fetch)?);
        let notifier = Arc::new(TemplateNotifier::new(&config.notifier)?);
        let storefront = Arc::new(HttpStorefrontSync::new(&config.storefront)?);

        let reconciler = Reconciler::new(
            repo.clone(),
            fetcher,
            Arc::new(RulesValidator::new()),
            Arc::new(ManifestDiffer::new()),
            config.retry.clone(),
        );
        let executor = EffectExecutor::new(repo.clone(), notifier, storefront);

        Ok(Self::new(repo, reconciler, executor, config.scheduler.clone()))
    }

    /// Effect executor, for callers that inspect the review queue
    pub fn executor(&self) -> &EffectExecutor {
        &self.executor
    }

    /// Reconcile every eligible app once, batch by batch
    pub async fn run_once(&self) -> Result<BatchReport> {
        let app_ids = self
            .repo
            .list_reconcilable_app_ids(self.config.include_packaged)
            .await?;
        info!("Reconciling {} app(s)", app_ids.len());

        let mut report = BatchReport::default();
        for batch in app_ids.chunks(self.config.batch_size.max(1)) {
            report.merge(self.run_batch(batch.to_vec()).await);
        }

        Ok(report)
    }

    /// Reconcile one batch of apps on the worker pool
    pub async fn run_batch(&self, app_ids: Vec<i64>) -> BatchReport {
        let mut seen = HashSet::new();
        let jobs: Vec<(i64, Option<RetryPayload>)> = app_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .map(|id| (id, None))
            .collect();

        let report = self.run_pool(jobs).await;
        debug!("Batch finished: {:?}", report);
        report
    }

    /// Run a scheduled retry now
    pub async fn run_retry(&self, payload: RetryPayload) -> BatchReport {
        let mut report = BatchReport::default();
        let result = self.process(payload.app_id, Some(payload)).await;
        self.tally(&mut report, payload.app_id, result);
        report
    }

    /// Claim every persisted retry that is due and run it on the worker pool
    pub async fn run_due_retries(&self) -> Result<BatchReport> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let due = self.repo.take_due_retries(now_ms).await?;
        if due.is_empty() {
            return Ok(BatchReport::default());
        }

        info!("Running {} due retr(ies)", due.len());
        let jobs = due
            .into_iter()
            .map(|retry| {
                let payload = RetryPayload {
                    app_id: retry.app_id,
                    failure_count: retry.failure_count,
                };
                (retry.app_id, Some(payload))
            })
            .collect();

        Ok(self.run_pool(jobs).await)
    }

    /// Run passes every `interval` and due retries until `shutdown` flips
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.interval());
        let mut retry_ticker = tokio::time::interval(self.config.retry_poll_interval());
        retry_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Scheduler started, one pass every {:?}", self.config.interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) => info!("Pass finished: {:?}", report),
                        Err(e) => error!("Pass failed: {:#}", e),
                    }
                }
                _ = retry_ticker.tick() => {
                    match self.run_due_retries().await {
                        Ok(report) if report.processed > 0 => debug!("Retries finished: {:?}", report),
                        Ok(_) => {}
                        Err(e) => error!("Could not run due retries: {:#}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scheduler shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    async fn run_pool(&self, jobs: Vec<(i64, Option<RetryPayload>)>) -> BatchReport {
        let workers = self.config.concurrent_workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));

        let results = stream::iter(jobs)
            .map(|(app_id, retry)| {
                let semaphore = semaphore.clone();
                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return (app_id, Err(PipelineError::Integration("Worker pool closed".to_string())));
                    };
                    (app_id, self.process(app_id, retry).await)
                }
            })
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await;

        let mut report = BatchReport::default();
        for (app_id, result) in results {
            self.tally(&mut report, app_id, result);
        }
        report
    }

    async fn process(
        &self,
        app_id: i64,
        retry: Option<RetryPayload>,
    ) -> Result<(CycleOutcome, ExecutionReport), PipelineError> {
        let outcome = match retry {
            Some(payload) => self.reconciler.run_retry(payload).await?,
            None => self.reconciler.reconcile(app_id).await?,
        };

        let execution = self.executor.execute(&outcome.effects).await?;
        for (payload, delay) in &execution.retries {
            self.schedule_retry(*payload, *delay).await?;
        }

        Ok((outcome, execution))
    }

    async fn schedule_retry(&self, payload: RetryPayload, delay: Duration) -> Result<(), PipelineError> {
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let due_at_ms = chrono::Utc::now().timestamp_millis().saturating_add(delay_ms);

        self.repo
            .schedule_retry(ScheduledRetry {
                app_id: payload.app_id,
                failure_count: payload.failure_count,
                due_at_ms,
            })
            .await?;
        debug!("App {}: retry #{} due in {:?}", payload.app_id, payload.failure_count, delay);
        Ok(())
    }

    fn tally(
        &self,
        report: &mut BatchReport,
        app_id: i64,
        result: Result<(CycleOutcome, ExecutionReport), PipelineError>,
    ) {
        match result {
            Ok((outcome, execution)) => report.record(&outcome, &execution),
            Err(PipelineError::NotFound(_)) => {
                warn!("App {} vanished before it could be reconciled", app_id);
                report.processed += 1;
                report.skipped += 1;
            }
            Err(e) => {
                error!("App {}: cycle aborted: {}", app_id, e);
                report.processed += 1;
                report.errors += 1;
            }
        }
    }
}
