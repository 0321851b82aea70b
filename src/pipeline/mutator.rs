/*!
 * Applies an accepted manifest to the canonical records.
 *
 * Everything happens in one transaction per app:
 * - a new file carrying the fresh hash (packaged apps get a new version too)
 * - the app's name and default locale
 * - translation rows for added and updated locale names
 * - the developer name and manifest document on the version
 * - the status recomputation
 *
 * The latest hash is re-read inside the transaction, so two cycles racing on
 * the same content store it only once.
 */

use log::{debug, info};
use rusqlite::Connection;

use super::status::{StatusChange, StatusStateMachine};
use crate::database::models::{AppRecord, FileStatus, TranslationRecord};
use crate::database::{NewVersion, Repository};
use crate::errors::PipelineError;
use crate::manifest::{ChangeSet, Manifest};

/// Platform label of files created from a fetched manifest
pub const MANIFEST_PLATFORM: &str = "web";

/// Accepted manifest ready to be applied
#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub app_id: i64,
    /// Content hash of the fetched bytes
    pub hash: String,
    /// Validated manifest
    pub manifest: Manifest,
    /// Differences against the stored manifest
    pub changes: ChangeSet,
}

/// What the mutator did
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Records were written
    Applied(AppliedMutation),
    /// A concurrent cycle already stored this hash; nothing was written
    AlreadyApplied,
}

/// Records written by a successful mutation
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMutation {
    /// The change-set that was applied
    pub changes: ChangeSet,
    /// Version the new file is bound to
    pub version_id: i64,
    /// Whether that version was created by this mutation
    pub created_version: bool,
    /// The new file
    pub file_id: i64,
    /// Status recomputation result
    pub status: StatusChange,
}

enum TxOutcome {
    Missing,
    Duplicate,
    Applied(AppliedMutation),
}

/// Writes accepted manifests
#[derive(Clone)]
pub struct VersionMutator {
    repo: Repository,
}

impl VersionMutator {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Apply an accepted manifest atomically
    ///
    /// # Returns
    /// * `Ok(MutationOutcome)` - Applied, or skipped as a duplicate
    /// * `Err(PipelineError)` - Nothing was written
    pub async fn apply(&self, request: MutationRequest) -> Result<MutationOutcome, PipelineError> {
        let app_id = request.app_id;

        let outcome = self
            .repo
            .connection()
            .transaction_async(move |tx| Self::apply_sync(tx, request))
            .await?;

        match outcome {
            TxOutcome::Missing => Err(PipelineError::NotFound(app_id)),
            TxOutcome::Duplicate => {
                debug!("App {}: manifest already stored by a concurrent cycle", app_id);
                Ok(MutationOutcome::AlreadyApplied)
            }
            TxOutcome::Applied(applied) => {
                info!(
                    "App {}: stored manifest as file {} on version {}{}",
                    app_id,
                    applied.file_id,
                    applied.version_id,
                    if applied.created_version { " (new version)" } else { "" }
                );
                Ok(MutationOutcome::Applied(applied))
            }
        }
    }

    fn apply_sync(conn: &Connection, request: MutationRequest) -> anyhow::Result<TxOutcome> {
        let MutationRequest {
            app_id,
            hash,
            manifest,
            changes,
        } = request;

        let Some(app) = Repository::get_app_sync(conn, app_id)? else {
            return Ok(TxOutcome::Missing);
        };

        let latest_file = Repository::latest_file_sync(conn, app_id)?;
        if latest_file.as_ref().is_some_and(|f| f.hash == hash) {
            return Ok(TxOutcome::Duplicate);
        }

        let manifest_json = manifest.to_json();
        let developer_name = manifest
            .developer_name()
            .unwrap_or(&app.author)
            .to_string();
        let supported_locales = manifest.supported_locales();
        let latest_version = Repository::latest_version_sync(conn, app_id)?;

        let (version_id, created_version, file_status) = match latest_version {
            Some(version) if !app.is_packaged => {
                let version_string = manifest
                    .version
                    .as_deref()
                    .map(str::trim)
                    .filter(|declared| !declared.is_empty())
                    .unwrap_or(&version.version);
                Repository::update_version_manifest_sync(
                    conn,
                    version.id,
                    version_string,
                    &developer_name,
                    &supported_locales,
                    &manifest_json,
                )?;
                let inherited = latest_file.map_or(FileStatus::Pending, |f| f.status);
                (version.id, false, inherited)
            }
            previous => {
                let version_string = next_version_string(
                    manifest.version.as_deref(),
                    previous.as_ref().map(|v| v.version.as_str()),
                );
                let new_version = NewVersion {
                    version: version_string,
                    release_notes: None,
                    developer_name: developer_name.clone(),
                    nominated_at: Some(chrono::Utc::now().to_rfc3339()),
                    supported_locales,
                    manifest_json: Some(manifest_json),
                };
                let version_id = Repository::insert_version_sync(conn, app_id, &new_version)?;
                (version_id, true, FileStatus::Pending)
            }
        };

        let file_id = Repository::insert_file_sync(conn, version_id, &hash, MANIFEST_PLATFORM, file_status)?;

        Self::apply_identity(conn, &app, &manifest, &changes)?;

        let status = StatusStateMachine::recompute_sync(conn, app_id)?
            .ok_or_else(|| anyhow::anyhow!("App {} disappeared during mutation", app_id))?;

        Ok(TxOutcome::Applied(AppliedMutation {
            changes,
            version_id,
            created_version,
            file_id,
            status,
        }))
    }

    fn apply_identity(conn: &Connection, app: &AppRecord, manifest: &Manifest, changes: &ChangeSet) -> anyhow::Result<()> {
        let name = changes
            .name_changed
            .as_ref()
            .map_or(app.name.as_str(), |(_, new)| new.as_str());
        let default_locale = changes
            .default_locale_changed
            .as_ref()
            .map_or(app.default_locale.as_str(), |(_, new)| new.as_str());

        Repository::update_app_identity_sync(conn, app.id, name, default_locale)?;

        let upsert = |locale: &str, text: &str| {
            Repository::upsert_translation_sync(
                conn,
                &TranslationRecord {
                    owner_kind: "app".to_string(),
                    owner_id: app.id,
                    field: "name".to_string(),
                    locale: locale.to_string(),
                    text: text.to_string(),
                },
            )
        };

        if let Some(root_name) = manifest.name.as_deref() {
            upsert(default_locale, root_name)?;
        }

        for (locale, text) in &changes.locales_added {
            upsert(locale.as_str(), text.as_str())?;
        }

        for (locale, (_, text)) in &changes.locales_updated {
            upsert(locale.as_str(), text.as_str())?;
        }

        Ok(())
    }
}

/// Version string of a new packaged version
///
/// The manifest's own version wins unless it repeats the previous one, in which
/// case the previous version's last numeric component is bumped.
pub fn next_version_string(declared: Option<&str>, previous: Option<&str>) -> String {
    let declared = declared.map(str::trim).filter(|v| !v.is_empty());

    match (declared, previous) {
        (Some(declared), Some(previous)) if declared == previous => bump_version(previous),
        (Some(declared), _) => declared.to_string(),
        (None, Some(previous)) => bump_version(previous),
        (None, None) => "1.0".to_string(),
    }
}

fn bump_version(version: &str) -> String {
    match version.rsplit_once('.') {
        Some((head, last)) => match last.parse::<u64>() {
            Ok(n) => format!("{}.{}", head, n + 1),
            Err(_) => format!("{}.1", version),
        },
        None => match version.parse::<u64>() {
            Ok(n) => (n + 1).to_string(),
            Err(_) => format!("{}.1", version),
        },
    }
}
