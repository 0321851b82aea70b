/*!
 * Manifest change detection.
 *
 * Compares the stored manifest of an app (which may be absent) with a freshly
 * fetched, already validated one. Root `name` is compared string for string,
 * `developer.name` falls back to the app's stored author identity, and the
 * `locales` map is compared key by key on the localized name.
 */

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

use super::model::Manifest;
use crate::database::models::AppRecord;

/// Differences between two manifests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Root name (old, new)
    pub name_changed: Option<(String, String)>,
    /// Developer name (old, new)
    pub developer_name_changed: Option<(String, String)>,
    /// Default locale (old, new)
    pub default_locale_changed: Option<(String, String)>,
    /// Newly declared locales and their names
    pub locales_added: BTreeMap<String, String>,
    /// Locales whose name changed (old, new)
    pub locales_updated: BTreeMap<String, (String, String)>,
    /// Locales no longer declared
    pub locales_removed: Vec<String>,
}

impl ChangeSet {
    /// Whether nothing changed at all
    pub fn is_empty(&self) -> bool {
        self.name_changed.is_none()
            && self.developer_name_changed.is_none()
            && self.default_locale_changed.is_none()
            && self.locales_added.is_empty()
            && self.locales_updated.is_empty()
            && self.locales_removed.is_empty()
    }

    /// Whether a human must look at the change.
    /// Locale removals never count.
    pub fn requires_review(&self) -> bool {
        self.affects_identity() || !self.locales_added.is_empty() || !self.locales_updated.is_empty()
    }

    /// Whether the change touches what the rating authority knows about the app
    pub fn affects_identity(&self) -> bool {
        self.name_changed.is_some() || self.developer_name_changed.is_some()
    }

    /// Reviewer-facing summary of the reviewable parts of the change
    pub fn review_message(&self) -> String {
        let mut parts = Vec::new();

        if let Some((old, new)) = &self.name_changed {
            parts.push(format!("Name changed from \"{}\" to \"{}\"", old, new));
        }

        if let Some((old, new)) = &self.developer_name_changed {
            parts.push(format!("Developer name changed from \"{}\" to \"{}\"", old, new));
        }

        if !self.locales_added.is_empty() {
            let added: Vec<String> = self
                .locales_added
                .iter()
                .map(|(locale, name)| format!("{} (\"{}\")", locale, name))
                .collect();
            parts.push(format!("Locales added: {}", added.join(", ")));
        }

        if !self.locales_updated.is_empty() {
            let updated: Vec<String> = self
                .locales_updated
                .iter()
                .map(|(locale, (old, new))| format!("{} (\"{}\" -> \"{}\")", locale, old, new))
                .collect();
            parts.push(format!("Locales updated: {}", updated.join(", ")));
        }

        parts.join("; ")
    }
}

/// Stored values used when the old manifest does not declare a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFallback {
    /// Stored app name
    pub name: String,
    /// Stored account identity of the submitter
    pub author: String,
    /// Stored default locale
    pub default_locale: String,
}

impl DiffFallback {
    pub fn from_app(app: &AppRecord) -> Self {
        Self {
            name: app.name.clone(),
            author: app.author.clone(),
            default_locale: app.default_locale.clone(),
        }
    }
}

/// Computes change-sets
pub trait ManifestDiff: Send + Sync + Debug {
    /// Compare `old` (absent on the first reconciliation) with `new`
    fn diff(&self, old: Option<&Manifest>, new: &Manifest, fallback: &DiffFallback) -> ChangeSet;
}

/// Default differ
#[derive(Debug, Clone, Default)]
pub struct ManifestDiffer;

impl ManifestDiffer {
    pub fn new() -> Self {
        Self
    }
}

impl ManifestDiff for ManifestDiffer {
    fn diff(&self, old: Option<&Manifest>, new: &Manifest, fallback: &DiffFallback) -> ChangeSet {
        diff_manifests(old, new, fallback)
    }
}

fn changed(old: &str, new: &str) -> Option<(String, String)> {
    (old != new).then(|| (old.to_string(), new.to_string()))
}

/// Compute the change-set between two manifests
pub fn diff_manifests(old: Option<&Manifest>, new: &Manifest, fallback: &DiffFallback) -> ChangeSet {
    let old_name = old
        .and_then(|m| m.name.as_deref())
        .unwrap_or(&fallback.name);
    let new_name = new.name.as_deref().unwrap_or(old_name);

    let old_developer = old
        .and_then(Manifest::developer_name)
        .unwrap_or(&fallback.author);
    let new_developer = new.developer_name().unwrap_or(&fallback.author);

    let old_locale = old
        .and_then(|m| m.default_locale.as_deref())
        .unwrap_or(&fallback.default_locale);
    let new_locale = new.default_locale.as_deref().unwrap_or(&fallback.default_locale);

    let old_names = old.map(Manifest::locale_names).unwrap_or_default();
    let new_names = new.locale_names();

    let mut changes = ChangeSet {
        name_changed: changed(old_name, new_name),
        developer_name_changed: changed(old_developer, new_developer),
        default_locale_changed: changed(old_locale, new_locale),
        ..Default::default()
    };

    for (locale, new_value) in &new_names {
        match old_names.get(locale) {
            None => {
                changes.locales_added.insert(locale.to_string(), new_value.to_string());
            }
            Some(old_value) if old_value != new_value => {
                changes
                    .locales_updated
                    .insert(locale.to_string(), (old_value.to_string(), new_value.to_string()));
            }
            Some(_) => {}
        }
    }

    changes.locales_removed = old_names
        .keys()
        .filter(|locale| !new_names.contains_key(*locale))
        .map(|locale| locale.to_string())
        .collect();

    changes
}
