/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 * The `*_sync` helpers take a bare connection so that pipeline stages can
 * compose them inside a single transaction.
 */

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::connection::DatabaseConnection;
use super::models::{
    AppDeveloperRecord, AppRecord, AppStatus, ContentRatingRecord, FileRecord, FileStatus,
    RetryState, ReviewQueueEntry, ReviewReason, ScheduledRetry, TranslationRecord,
    ValidationReportRecord, VersionRecord,
};

const APP_COLUMNS: &str = "id, manifest_url, default_locale, name, author, is_packaged, status, \
     iarc_submission_id, iarc_security_code, interactive_elements, last_manifest_check_at, \
     created_at, updated_at";

const VERSION_COLUMNS: &str = "id, app_id, version, release_notes, developer_name, nominated_at, \
     supported_locales, manifest_json, created_at";

const FILE_COLUMNS: &str = "f.id, f.version_id, f.hash, f.platform, f.status, f.created_at";

/// Values needed to insert a version
#[derive(Debug, Clone, Default)]
pub struct NewVersion {
    /// Version string
    pub version: String,
    /// Release notes
    pub release_notes: Option<String>,
    /// Developer name as declared in the manifest
    pub developer_name: String,
    /// Nomination timestamp
    pub nominated_at: Option<String>,
    /// Declared locales
    pub supported_locales: Vec<String>,
    /// Manifest document
    pub manifest_json: Option<String>,
}

fn parse_app_row(row: &Row) -> rusqlite::Result<AppRecord> {
    let interactive: String = row.get(9)?;
    Ok(AppRecord {
        id: row.get(0)?,
        manifest_url: row.get(1)?,
        default_locale: row.get(2)?,
        name: row.get(3)?,
        author: row.get(4)?,
        is_packaged: row.get(5)?,
        status: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or(AppStatus::Incomplete),
        iarc_submission_id: row.get(7)?,
        iarc_security_code: row.get(8)?,
        interactive_elements: serde_json::from_str(&interactive).unwrap_or_default(),
        last_manifest_check_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn parse_version_row(row: &Row) -> rusqlite::Result<VersionRecord> {
    let locales: String = row.get(6)?;
    Ok(VersionRecord {
        id: row.get(0)?,
        app_id: row.get(1)?,
        version: row.get(2)?,
        release_notes: row.get(3)?,
        developer_name: row.get(4)?,
        nominated_at: row.get(5)?,
        supported_locales: locales
            .split(',')
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        manifest_json: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn parse_file_row(row: &Row) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        version_id: row.get(1)?,
        hash: row.get(2)?,
        platform: row.get(3)?,
        status: row
            .get::<_, String>(4)?
            .parse()
            .unwrap_or(FileStatus::Pending),
        created_at: row.get(5)?,
    })
}

fn parse_scheduled_retry_row(row: &Row) -> rusqlite::Result<ScheduledRetry> {
    Ok(ScheduledRetry {
        app_id: row.get(0)?,
        failure_count: row.get(1)?,
        due_at_ms: row.get(2)?,
    })
}

fn parse_review_row(row: &Row) -> rusqlite::Result<ReviewQueueEntry> {
    Ok(ReviewQueueEntry {
        id: row.get(0)?,
        app_id: row.get(1)?,
        reason_code: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(ReviewReason::ManifestChange),
        message: row.get(3)?,
        flagged_at: row.get(4)?,
    })
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Underlying connection, for callers composing their own transactions
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // App Operations
    // =========================================================================

    /// Insert an app record
    pub async fn create_app(&self, app: &AppRecord) -> Result<()> {
        let app = app.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO apps (
                        id, manifest_url, default_locale, name, author, is_packaged, status,
                        iarc_submission_id, iarc_security_code, interactive_elements,
                        last_manifest_check_at, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    params![
                        app.id,
                        app.manifest_url,
                        app.default_locale,
                        app.name,
                        app.author,
                        app.is_packaged,
                        app.status.to_string(),
                        app.iarc_submission_id,
                        app.iarc_security_code,
                        serde_json::to_string(&app.interactive_elements)?,
                        app.last_manifest_check_at,
                        app.created_at,
                        app.updated_at,
                    ],
                )
                .with_context(|| format!("Failed to insert app {}", app.id))?;
                Ok(())
            })
            .await
    }

    /// Get an app by ID
    pub async fn get_app(&self, app_id: i64) -> Result<Option<AppRecord>> {
        self.db
            .execute_async(move |conn| Self::get_app_sync(conn, app_id))
            .await
    }

    /// Get an app by ID (synchronous version for use within transactions)
    pub(crate) fn get_app_sync(conn: &Connection, app_id: i64) -> Result<Option<AppRecord>> {
        let sql = format!("SELECT {} FROM apps WHERE id = ?1", APP_COLUMNS);
        Ok(conn.query_row(&sql, [app_id], parse_app_row).optional()?)
    }

    /// IDs of apps whose manifests should be reconciled, oldest check first
    pub async fn list_reconcilable_app_ids(&self, include_packaged: bool) -> Result<Vec<i64>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id FROM apps
                    WHERE status NOT IN ('disabled', 'blocked')
                      AND (?1 OR is_packaged = 0)
                    ORDER BY COALESCE(last_manifest_check_at, '') ASC, id ASC
                    "#,
                )?;
                let ids = stmt
                    .query_map([include_packaged], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<i64>>>()?;
                Ok(ids)
            })
            .await
    }

    /// Set an app's status directly (administrative transitions)
    pub async fn set_app_status(&self, app_id: i64, status: AppStatus) -> Result<()> {
        self.db
            .execute_async(move |conn| Self::set_app_status_sync(conn, app_id, status))
            .await
    }

    pub(crate) fn set_app_status_sync(conn: &Connection, app_id: i64, status: AppStatus) -> Result<()> {
        conn.execute(
            "UPDATE apps SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_string(), chrono::Utc::now().to_rfc3339(), app_id],
        )?;
        Ok(())
    }

    /// Record that a cycle looked at the app's manifest
    pub async fn touch_manifest_check(&self, app_id: i64) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE apps SET last_manifest_check_at = ?1 WHERE id = ?2",
                    params![now, app_id],
                )?;
                Ok(())
            })
            .await
    }

    pub(crate) fn update_app_identity_sync(
        conn: &Connection,
        app_id: i64,
        name: &str,
        default_locale: &str,
    ) -> Result<()> {
        conn.execute(
            "UPDATE apps SET name = ?1, default_locale = ?2, updated_at = ?3 WHERE id = ?4",
            params![name, default_locale, chrono::Utc::now().to_rfc3339(), app_id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Version and File Operations
    // =========================================================================

    /// Insert a version for an app and return its id
    pub async fn create_version(&self, app_id: i64, version: NewVersion) -> Result<i64> {
        self.db
            .execute_async(move |conn| Self::insert_version_sync(conn, app_id, &version))
            .await
    }

    pub(crate) fn insert_version_sync(conn: &Connection, app_id: i64, version: &NewVersion) -> Result<i64> {
        conn.execute(
            r#"
            INSERT INTO versions (
                app_id, version, release_notes, developer_name, nominated_at,
                supported_locales, manifest_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                app_id,
                version.version,
                version.release_notes,
                version.developer_name,
                version.nominated_at,
                version.supported_locales.join(","),
                version.manifest_json,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to insert version for app {}", app_id))?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a file for a version and return its id
    pub async fn add_file(&self, version_id: i64, hash: &str, status: FileStatus) -> Result<i64> {
        let hash = hash.to_string();
        self.db
            .execute_async(move |conn| Self::insert_file_sync(conn, version_id, &hash, "web", status))
            .await
    }

    pub(crate) fn insert_file_sync(
        conn: &Connection,
        version_id: i64,
        hash: &str,
        platform: &str,
        status: FileStatus,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO files (version_id, hash, platform, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![version_id, hash, platform, status.to_string(), chrono::Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("Failed to insert file for version {}", version_id))?;
        Ok(conn.last_insert_rowid())
    }

    pub(crate) fn set_file_status_sync(conn: &Connection, file_id: i64, status: FileStatus) -> Result<Option<i64>> {
        conn.execute(
            "UPDATE files SET status = ?1 WHERE id = ?2",
            params![status.to_string(), file_id],
        )?;
        let app_id = conn
            .query_row(
                "SELECT v.app_id FROM files f JOIN versions v ON v.id = f.version_id WHERE f.id = ?1",
                [file_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(app_id)
    }

    /// Most recent version of an app
    pub async fn latest_version(&self, app_id: i64) -> Result<Option<VersionRecord>> {
        self.db
            .execute_async(move |conn| Self::latest_version_sync(conn, app_id))
            .await
    }

    pub(crate) fn latest_version_sync(conn: &Connection, app_id: i64) -> Result<Option<VersionRecord>> {
        let sql = format!(
            "SELECT {} FROM versions WHERE app_id = ?1 ORDER BY id DESC LIMIT 1",
            VERSION_COLUMNS
        );
        Ok(conn.query_row(&sql, [app_id], parse_version_row).optional()?)
    }

    /// All versions of an app, oldest first
    pub async fn versions_for_app(&self, app_id: i64) -> Result<Vec<VersionRecord>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!("SELECT {} FROM versions WHERE app_id = ?1 ORDER BY id ASC", VERSION_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let versions = stmt
                    .query_map([app_id], parse_version_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(versions)
            })
            .await
    }

    /// Most recent file across all of an app's versions
    pub async fn latest_file(&self, app_id: i64) -> Result<Option<FileRecord>> {
        self.db
            .execute_async(move |conn| Self::latest_file_sync(conn, app_id))
            .await
    }

    pub(crate) fn latest_file_sync(conn: &Connection, app_id: i64) -> Result<Option<FileRecord>> {
        let sql = format!(
            "SELECT {} FROM files f JOIN versions v ON v.id = f.version_id \
             WHERE v.app_id = ?1 ORDER BY f.id DESC LIMIT 1",
            FILE_COLUMNS
        );
        Ok(conn.query_row(&sql, [app_id], parse_file_row).optional()?)
    }

    /// All files of an app
    pub async fn files_for_app(&self, app_id: i64) -> Result<Vec<FileRecord>> {
        self.db
            .execute_async(move |conn| Self::files_for_app_sync(conn, app_id))
            .await
    }

    pub(crate) fn files_for_app_sync(conn: &Connection, app_id: i64) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {} FROM files f JOIN versions v ON v.id = f.version_id \
             WHERE v.app_id = ?1 ORDER BY f.id ASC",
            FILE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let files = stmt
            .query_map([app_id], parse_file_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    pub(crate) fn update_version_manifest_sync(
        conn: &Connection,
        version_id: i64,
        version: &str,
        developer_name: &str,
        supported_locales: &[String],
        manifest_json: &str,
    ) -> Result<()> {
        conn.execute(
            r#"
            UPDATE versions
            SET version = ?1, developer_name = ?2, supported_locales = ?3, manifest_json = ?4
            WHERE id = ?5
            "#,
            params![version, developer_name, supported_locales.join(","), manifest_json, version_id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Translation Operations
    // =========================================================================

    pub(crate) fn upsert_translation_sync(conn: &Connection, translation: &TranslationRecord) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO translations (owner_kind, owner_id, field, locale, localized_string, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(owner_kind, owner_id, field, locale)
            DO UPDATE SET localized_string = excluded.localized_string, updated_at = excluded.updated_at
            "#,
            params![
                translation.owner_kind,
                translation.owner_id,
                translation.field,
                translation.locale,
                translation.text,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Insert or replace one translation
    pub async fn upsert_translation(&self, translation: TranslationRecord) -> Result<()> {
        self.db
            .execute_async(move |conn| Self::upsert_translation_sync(conn, &translation))
            .await
    }

    /// Translations of one field, ordered by locale
    pub async fn translations_for(&self, owner_kind: &str, owner_id: i64, field: &str) -> Result<Vec<TranslationRecord>> {
        let owner_kind = owner_kind.to_string();
        let field = field.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT owner_kind, owner_id, field, locale, localized_string
                    FROM translations
                    WHERE owner_kind = ?1 AND owner_id = ?2 AND field = ?3
                    ORDER BY locale ASC
                    "#,
                )?;
                let rows = stmt
                    .query_map(params![owner_kind, owner_id, field], |row| {
                        Ok(TranslationRecord {
                            owner_kind: row.get(0)?,
                            owner_id: row.get(1)?,
                            field: row.get(2)?,
                            locale: row.get(3)?,
                            text: row.get(4)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    // =========================================================================
    // Retry State Operations
    // =========================================================================

    /// Current retry state; a missing row means no failures
    pub async fn get_retry_state(&self, app_id: i64) -> Result<RetryState> {
        self.db
            .execute_async(move |conn| Self::get_retry_state_sync(conn, app_id))
            .await
    }

    fn get_retry_state_sync(conn: &Connection, app_id: i64) -> Result<RetryState> {
        let state = conn
            .query_row(
                "SELECT app_id, failure_count, last_attempt_at, revision FROM retry_states WHERE app_id = ?1",
                [app_id],
                |row| {
                    Ok(RetryState {
                        app_id: row.get(0)?,
                        failure_count: row.get(1)?,
                        last_attempt_at: row.get(2)?,
                        revision: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_else(|| RetryState::new(app_id)))
    }

    /// Atomically add one fetch failure and return the new state
    pub async fn record_fetch_failure(&self, app_id: i64) -> Result<RetryState> {
        let now = chrono::Utc::now().timestamp();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    INSERT INTO retry_states (app_id, failure_count, last_attempt_at, revision)
                    VALUES (?1, 1, ?2, 1)
                    ON CONFLICT(app_id) DO UPDATE SET
                        failure_count = failure_count + 1,
                        last_attempt_at = excluded.last_attempt_at,
                        revision = revision + 1
                    "#,
                    params![app_id, now],
                )?;
                Self::get_retry_state_sync(tx, app_id)
            })
            .await
    }

    /// Reset the failure counter only if nobody touched it since `expected_revision`
    pub async fn reset_failures_if_unchanged(&self, app_id: i64, expected_revision: i64) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE retry_states
                    SET failure_count = 0, revision = revision + 1
                    WHERE app_id = ?1 AND revision = ?2
                    "#,
                    params![app_id, expected_revision],
                )?;
                Ok(changed == 1)
            })
            .await
    }

    // =========================================================================
    // Scheduled Retry Operations
    // =========================================================================

    /// Persist a retry, replacing any retry already pending for the app
    pub async fn schedule_retry(&self, retry: ScheduledRetry) -> Result<()> {
        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO scheduled_retries (app_id, failure_count, due_at_ms)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(app_id) DO UPDATE SET
                        failure_count = excluded.failure_count,
                        due_at_ms = excluded.due_at_ms
                    "#,
                    params![retry.app_id, retry.failure_count, retry.due_at_ms],
                )
                .with_context(|| format!("Failed to schedule retry for app {}", retry.app_id))?;
                Ok(())
            })
            .await
    }

    /// Remove and return every retry due at or before `now_ms`, earliest first
    pub async fn take_due_retries(&self, now_ms: i64) -> Result<Vec<ScheduledRetry>> {
        self.db
            .transaction_async(move |tx| {
                let due = {
                    let mut stmt = tx.prepare(
                        "SELECT app_id, failure_count, due_at_ms FROM scheduled_retries \
                         WHERE due_at_ms <= ?1 ORDER BY due_at_ms ASC",
                    )?;
                    stmt.query_map([now_ms], parse_scheduled_retry_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                };

                tx.execute("DELETE FROM scheduled_retries WHERE due_at_ms <= ?1", [now_ms])?;
                Ok(due)
            })
            .await
    }

    /// Retries not yet claimed, earliest first
    pub async fn pending_retries(&self) -> Result<Vec<ScheduledRetry>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT app_id, failure_count, due_at_ms FROM scheduled_retries ORDER BY due_at_ms ASC",
                )?;
                let retries = stmt
                    .query_map([], parse_scheduled_retry_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(retries)
            })
            .await
    }

    // =========================================================================
    // Review Queue Operations
    // =========================================================================

    /// Append an entry to the review queue
    pub async fn insert_review_entry(
        &self,
        app_id: i64,
        reason: ReviewReason,
        message: &str,
    ) -> Result<ReviewQueueEntry> {
        let message = message.to_string();
        let flagged_at = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO review_queue (app_id, reason, message, flagged_at) VALUES (?1, ?2, ?3, ?4)",
                    params![app_id, reason.to_string(), message, flagged_at],
                )
                .with_context(|| format!("Failed to flag app {} for review", app_id))?;

                debug!("Flagged app {} for review ({})", app_id, reason);

                Ok(ReviewQueueEntry {
                    id: conn.last_insert_rowid(),
                    app_id,
                    reason_code: reason,
                    message,
                    flagged_at,
                })
            })
            .await
    }

    /// Review entries of one app, oldest first
    pub async fn review_entries_for(&self, app_id: i64) -> Result<Vec<ReviewQueueEntry>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, app_id, reason, message, flagged_at FROM review_queue WHERE app_id = ?1 ORDER BY id ASC",
                )?;
                let entries = stmt
                    .query_map([app_id], parse_review_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(entries)
            })
            .await
    }

    /// Whether the app has any entry in the review queue
    pub async fn has_review_entry(&self, app_id: i64) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM review_queue WHERE app_id = ?1)",
                    [app_id],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
    }

    /// All review entries, oldest first
    pub async fn pending_review_entries(&self) -> Result<Vec<ReviewQueueEntry>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, app_id, reason, message, flagged_at FROM review_queue ORDER BY id ASC",
                )?;
                let entries = stmt
                    .query_map([], parse_review_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(entries)
            })
            .await
    }

    // =========================================================================
    // Developer, Rating and Report Operations
    // =========================================================================

    /// List a developer on an app
    pub async fn add_developer(&self, developer: AppDeveloperRecord) -> Result<()> {
        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO app_developers (app_id, email, locale) VALUES (?1, ?2, ?3)",
                    params![developer.app_id, developer.email, developer.locale],
                )?;
                Ok(())
            })
            .await
    }

    /// Developers listed on an app
    pub async fn developers_for(&self, app_id: i64) -> Result<Vec<AppDeveloperRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT app_id, email, locale FROM app_developers WHERE app_id = ?1 ORDER BY email ASC",
                )?;
                let developers = stmt
                    .query_map([app_id], |row| {
                        Ok(AppDeveloperRecord {
                            app_id: row.get(0)?,
                            email: row.get(1)?,
                            locale: row.get(2)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(developers)
            })
            .await
    }

    /// Insert or replace the rating of one rating body
    pub async fn upsert_content_rating(&self, rating: ContentRatingRecord) -> Result<()> {
        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO content_ratings (app_id, rating_body, rating, descriptors) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        rating.app_id,
                        rating.rating_body,
                        rating.rating,
                        serde_json::to_string(&rating.descriptors)?,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Ratings of an app, one per rating body
    pub async fn content_ratings_for(&self, app_id: i64) -> Result<Vec<ContentRatingRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT app_id, rating_body, rating, descriptors FROM content_ratings WHERE app_id = ?1 ORDER BY rating_body ASC",
                )?;
                let ratings = stmt
                    .query_map([app_id], |row| {
                        let descriptors: String = row.get(3)?;
                        Ok(ContentRatingRecord {
                            app_id: row.get(0)?,
                            rating_body: row.get(1)?,
                            rating: row.get(2)?,
                            descriptors: serde_json::from_str(&descriptors).unwrap_or_default(),
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(ratings)
            })
            .await
    }

    /// Persist a validator result and return the stored record
    pub async fn store_validation_report(&self, app_id: i64, report_json: String) -> Result<ValidationReportRecord> {
        let record = ValidationReportRecord {
            id: uuid::Uuid::new_v4().to_string(),
            app_id,
            report_json,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let stored = record.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO validation_reports (id, app_id, report_json, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![record.id, record.app_id, record.report_json, record.created_at],
                )?;
                Ok(())
            })
            .await?;

        Ok(stored)
    }

    /// Fetch a stored validation report
    pub async fn get_validation_report(&self, report_id: &str) -> Result<Option<ValidationReportRecord>> {
        let report_id = report_id.to_string();

        self.db
            .execute_async(move |conn| {
                let report = conn
                    .query_row(
                        "SELECT id, app_id, report_json, created_at FROM validation_reports WHERE id = ?1",
                        [report_id],
                        |row| {
                            Ok(ValidationReportRecord {
                                id: row.get(0)?,
                                app_id: row.get(1)?,
                                report_json: row.get(2)?,
                                created_at: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(report)
            })
            .await
    }
}
