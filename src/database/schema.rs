/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for the catalog tables the pipeline
 * reads and writes, plus its own retry and review queue bookkeeping.
 */

use anyhow::{Context, Result};
use rusqlite::Connection;
use log::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Foreign keys are a per-connection setting
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // WAL for concurrent readers; ignored for in-memory databases
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS apps (
            id INTEGER PRIMARY KEY,
            manifest_url TEXT NOT NULL,
            default_locale TEXT NOT NULL,
            name TEXT NOT NULL,
            author TEXT NOT NULL DEFAULT '',
            is_packaged INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'incomplete',
            iarc_submission_id TEXT,
            iarc_security_code TEXT,
            interactive_elements TEXT NOT NULL DEFAULT '[]',
            last_manifest_check_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_apps_status ON apps(status);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            app_id INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
            version TEXT NOT NULL,
            release_notes TEXT,
            developer_name TEXT NOT NULL DEFAULT '',
            nominated_at TEXT,
            supported_locales TEXT NOT NULL DEFAULT '',
            manifest_json TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_versions_app ON versions(app_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version_id INTEGER NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
            hash TEXT NOT NULL,
            platform TEXT NOT NULL DEFAULT 'web',
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_files_version ON files(version_id);
        CREATE INDEX IF NOT EXISTS idx_files_hash ON files(hash);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_kind TEXT NOT NULL,
            owner_id INTEGER NOT NULL,
            field TEXT NOT NULL,
            locale TEXT NOT NULL,
            localized_string TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(owner_kind, owner_id, field, locale)
        );

        CREATE INDEX IF NOT EXISTS idx_translations_owner ON translations(owner_kind, owner_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS retry_states (
            app_id INTEGER PRIMARY KEY REFERENCES apps(id) ON DELETE CASCADE,
            failure_count INTEGER NOT NULL DEFAULT 0,
            last_attempt_at INTEGER,
            revision INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )?;

    create_scheduled_retries_table(conn)?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS review_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            app_id INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
            reason TEXT NOT NULL,
            message TEXT NOT NULL,
            flagged_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_review_queue_app ON review_queue(app_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS app_developers (
            app_id INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
            email TEXT NOT NULL,
            locale TEXT NOT NULL DEFAULT 'en-US',
            UNIQUE(app_id, email)
        );

        CREATE TABLE IF NOT EXISTS content_ratings (
            app_id INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
            rating_body TEXT NOT NULL,
            rating TEXT NOT NULL,
            descriptors TEXT NOT NULL DEFAULT '[]',
            UNIQUE(app_id, rating_body)
        );

        CREATE TABLE IF NOT EXISTS validation_reports (
            id TEXT PRIMARY KEY,
            app_id INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
            report_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Pending retries, one per app; a newer retry replaces the older one
fn create_scheduled_retries_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS scheduled_retries (
            app_id INTEGER PRIMARY KEY REFERENCES apps(id) ON DELETE CASCADE,
            failure_count INTEGER NOT NULL,
            due_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_scheduled_retries_due ON scheduled_retries(due_at_ms);
        "#,
    )?;
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    if current == 1 {
        info!("Migrating v1 -> v2: adding scheduled_retries");
        create_scheduled_retries_table(conn)?;
        current = 2;
    }

    if current < SCHEMA_VERSION {
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate.",
            current
        ));
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
