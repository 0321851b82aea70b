/*!
 * Human review escalation queue.
 *
 * Append-only from the pipeline's side; entries are drained by reviewers
 * outside this system. Repeated flags for the same app and reason are all
 * kept.
 */

use log::info;

use crate::database::models::{ReviewQueueEntry, ReviewReason};
use crate::database::Repository;
use crate::errors::PipelineError;

/// Review queue backed by the `review_queue` table
#[derive(Clone)]
pub struct ReviewEscalationQueue {
    repo: Repository,
}

impl ReviewEscalationQueue {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Enqueue an app for human review
    pub async fn flag(&self, app_id: i64, reason: ReviewReason, message: &str) -> Result<ReviewQueueEntry, PipelineError> {
        let entry = self.repo.insert_review_entry(app_id, reason, message).await?;
        info!("App {} flagged for review ({}): {}", app_id, reason, message);
        Ok(entry)
    }

    /// Whether the app currently has an entry in the queue
    pub async fn is_flagged(&self, app_id: i64) -> Result<bool, PipelineError> {
        Ok(self.repo.has_review_entry(app_id).await?)
    }

    /// Entries waiting for a reviewer, oldest first
    pub async fn pending(&self) -> Result<Vec<ReviewQueueEntry>, PipelineError> {
        Ok(self.repo.pending_review_entries().await?)
    }
}
