/*!
 * Typed manifest document.
 *
 * Every field a developer may omit is an `Option` (or an empty map), so callers
 * check presence explicitly instead of relying on the document's shape.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Developer block of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Developer {
    /// Developer display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Developer homepage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Localized overrides for one locale
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleEntry {
    /// Localized app name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Localized description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A hosted or packaged app manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// App name in the default locale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Locale of the root-level strings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_locale: Option<String>,

    /// Developer block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<Developer>,

    /// Per-locale overrides, keyed by locale code
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub locales: BTreeMap<String, LocaleEntry>,

    /// App version string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Description in the default locale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Manifest {
    /// Parse a manifest from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(strip_bom(bytes))
    }

    /// Parse a manifest previously stored as JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize for storage
    pub fn to_json(&self) -> String {
        // A struct of strings and maps always serializes
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Declared developer name, if any
    pub fn developer_name(&self) -> Option<&str> {
        self.developer
            .as_ref()
            .and_then(|d| d.name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }

    /// Localized names, skipping locales that only override other fields
    pub fn locale_names(&self) -> BTreeMap<&str, &str> {
        self.locales
            .iter()
            .filter_map(|(locale, entry)| entry.name.as_deref().map(|name| (locale.as_str(), name)))
            .collect()
    }

    /// Every locale the manifest mentions, default locale first
    pub fn supported_locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = self.default_locale.iter().cloned().collect();
        for locale in self.locales.keys() {
            if !locales.contains(locale) {
                locales.push(locale.clone());
            }
        }
        locales
    }
}

/// Drop a leading UTF-8 byte order mark
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}
