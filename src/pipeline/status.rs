/*!
 * Release status state machine.
 *
 * An app's status is recomputed, never incrementally applied, from the set of
 * file statuses across all of its versions. The set is reduced to its most
 * significant member and looked up in a (current, aggregate) -> next table.
 * `rejected`, `disabled` and `blocked` are only ever entered through
 * reviewer or admin action.
 */

use log::info;
use rusqlite::Connection;

use crate::database::models::{AppStatus, FileStatus};
use crate::database::Repository;
use crate::errors::PipelineError;

/// Reduction of an app's file statuses, least significant first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileAggregate {
    /// No version has any file
    NoFiles,
    /// Every file is disabled
    OnlyDisabled,
    /// At least one rejected file, nothing pending or approved
    Rejected,
    /// At least one pending file, nothing approved
    Pending,
    /// Best file is approved for limited distribution
    ApprovedLimited,
    /// At least one file is approved for public listing
    ApprovedFull,
}

impl FileAggregate {
    /// Every aggregate value
    pub const ALL: [FileAggregate; 6] = [
        FileAggregate::NoFiles,
        FileAggregate::OnlyDisabled,
        FileAggregate::Rejected,
        FileAggregate::Pending,
        FileAggregate::ApprovedLimited,
        FileAggregate::ApprovedFull,
    ];

    fn of(status: FileStatus) -> Self {
        match status {
            FileStatus::Disabled => FileAggregate::OnlyDisabled,
            FileStatus::Rejected => FileAggregate::Rejected,
            FileStatus::Pending => FileAggregate::Pending,
            FileStatus::ApprovedLimited => FileAggregate::ApprovedLimited,
            FileStatus::ApprovedFull => FileAggregate::ApprovedFull,
        }
    }

    /// Reduce a set of file statuses to its most significant member
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = FileStatus>,
    {
        statuses
            .into_iter()
            .map(Self::of)
            .max()
            .unwrap_or(FileAggregate::NoFiles)
    }
}

/// Next app status for a current status and file aggregate
pub fn next_status(current: AppStatus, aggregate: FileAggregate) -> AppStatus {
    use AppStatus as S;
    use FileAggregate as A;

    match (current, aggregate) {
        (S::Disabled, _) => S::Disabled,
        (S::Blocked, _) => S::Blocked,

        (_, A::NoFiles) => S::Incomplete,

        (S::Rejected, A::Pending) => S::AwaitingReview,
        (S::Rejected, _) => S::Rejected,

        (_, A::ApprovedFull) => S::ApprovedFull,
        (_, A::ApprovedLimited) => S::ApprovedLimited,

        (S::Incomplete, A::OnlyDisabled) => S::Incomplete,
        (_, A::OnlyDisabled | A::Rejected | A::Pending) => S::AwaitingReview,
    }
}

/// Result of one recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub app_id: i64,
    pub previous: AppStatus,
    pub current: AppStatus,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Recomputes and persists app statuses
#[derive(Clone)]
pub struct StatusStateMachine {
    repo: Repository,
}

impl StatusStateMachine {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Recompute inside an open transaction
    pub(crate) fn recompute_sync(conn: &Connection, app_id: i64) -> anyhow::Result<Option<StatusChange>> {
        let Some(app) = Repository::get_app_sync(conn, app_id)? else {
            return Ok(None);
        };

        let files = Repository::files_for_app_sync(conn, app_id)?;
        let aggregate = FileAggregate::from_statuses(files.iter().map(|f| f.status));
        let next = next_status(app.status, aggregate);

        if next != app.status {
            Repository::set_app_status_sync(conn, app_id, next)?;
        }

        Ok(Some(StatusChange {
            app_id,
            previous: app.status,
            current: next,
        }))
    }

    /// Recompute an app's status from its files
    pub async fn recompute(&self, app_id: i64) -> Result<StatusChange, PipelineError> {
        let change = self
            .repo
            .connection()
            .transaction_async(move |tx| Self::recompute_sync(tx, app_id))
            .await?
            .ok_or(PipelineError::NotFound(app_id))?;

        if change.changed() {
            info!("App {} status: {} -> {}", app_id, change.previous, change.current);
        }

        Ok(change)
    }

    /// Change one file's status and recompute its app in the same transaction
    pub async fn update_file_status(&self, file_id: i64, status: FileStatus) -> Result<StatusChange, PipelineError> {
        let change = self
            .repo
            .connection()
            .transaction_async(move |tx| {
                let Some(app_id) = Repository::set_file_status_sync(tx, file_id, status)? else {
                    return Ok(None);
                };
                Self::recompute_sync(tx, app_id)
            })
            .await?
            .ok_or_else(|| PipelineError::Persistence(format!("File {} not found", file_id)))?;

        if change.changed() {
            info!(
                "App {} status: {} -> {} (file {} is now {})",
                change.app_id, change.previous, change.current, file_id, status
            );
        }

        Ok(change)
    }
}
