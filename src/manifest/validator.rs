/*!
 * Manifest validation boundary.
 *
 * The pipeline submits raw manifest bytes plus their origin and receives a
 * structured result. Any result with `errors > 0` is a validation failure.
 * `RulesValidator` is the in-process implementation; an out-of-process
 * validator service plugs in behind the same trait.
 *
 * Messages carry a tier:
 * - tier 1: the document cannot be read as a manifest at all
 * - tier 2: required fields, field formats and locale codes
 */

use async_trait::async_trait;
use isolang::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::model::Manifest;

/// Locale codes like `en`, `pt-BR`, `zh-Hant-TW`
static LOCALE_CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2,3})(-[A-Za-z0-9]{2,8})*$").expect("Invalid locale code regex")
});

/// Longest accepted app name, in characters
pub const MAX_NAME_LENGTH: usize = 128;

/// Where the manifest being validated comes from
#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// App the manifest belongs to
    pub app_id: i64,
    /// URL the manifest was fetched from
    pub manifest_url: String,
    /// Packaged apps have stricter requirements
    pub is_packaged: bool,
}

/// Severity of a validation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Error,
    Warning,
    Notice,
}

/// One diagnostic produced by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    /// Severity
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Human-readable description
    pub message: String,
    /// Validation tier that produced the message
    pub tier: u8,
}

/// Structured validator output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Number of error messages
    pub errors: u32,
    /// Number of warning messages
    #[serde(default)]
    pub warnings: u32,
    /// All diagnostics, in the order they were produced
    #[serde(default)]
    pub messages: Vec<ValidationMessage>,
}

impl ValidationResult {
    /// Whether the manifest passed validation
    pub fn is_valid(&self) -> bool {
        self.errors == 0
    }

    /// Record an error
    pub fn error(&mut self, tier: u8, message: impl Into<String>) {
        self.errors += 1;
        self.messages.push(ValidationMessage {
            kind: MessageKind::Error,
            message: message.into(),
            tier,
        });
    }

    /// Record a warning
    pub fn warning(&mut self, tier: u8, message: impl Into<String>) {
        self.warnings += 1;
        self.messages.push(ValidationMessage {
            kind: MessageKind::Warning,
            message: message.into(),
            tier,
        });
    }

    /// First error message, used as the notification text
    pub fn first_error(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.kind == MessageKind::Error)
            .map(|m| m.message.as_str())
    }

    /// Serialize for storage as a validation report
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Validates manifest content
#[async_trait]
pub trait ManifestValidator: Send + Sync + Debug {
    /// Validate raw manifest bytes
    ///
    /// # Returns
    /// * `Ok(ValidationResult)` - The verdict, passing or failing
    /// * `Err` - The validator itself could not run
    async fn validate(&self, body: &[u8], context: &ValidationContext) -> anyhow::Result<ValidationResult>;
}

/// Built-in rule set
#[derive(Debug, Clone, Default)]
pub struct RulesValidator;

impl RulesValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run every rule against the document
    pub fn check(body: &[u8], context: &ValidationContext) -> ValidationResult {
        let mut result = ValidationResult::default();

        let manifest = match Manifest::from_slice(body) {
            Ok(manifest) => manifest,
            Err(e) => {
                result.error(1, format!("The manifest could not be parsed: {}", e));
                return result;
            }
        };

        Self::check_name(&manifest, &mut result);
        Self::check_locales(&manifest, &mut result);
        Self::check_developer(&manifest, &mut result);

        if context.is_packaged && manifest.version.as_deref().is_none_or(|v| v.trim().is_empty()) {
            result.error(2, "Packaged apps must declare a `version`");
        }

        result
    }

    fn check_name(manifest: &Manifest, result: &mut ValidationResult) {
        match manifest.name.as_deref().map(str::trim) {
            None | Some("") => result.error(2, "The manifest must declare a non-empty `name`"),
            Some(name) if name.chars().count() > MAX_NAME_LENGTH => result.error(
                2,
                format!("`name` is longer than {} characters", MAX_NAME_LENGTH),
            ),
            Some(_) => {}
        }
    }

    fn check_locales(manifest: &Manifest, result: &mut ValidationResult) {
        match manifest.default_locale.as_deref() {
            Some(locale) if !is_valid_locale_code(locale) => {
                result.error(2, format!("`default_locale` '{}' is not a valid locale code", locale));
            }
            None if !manifest.locales.is_empty() => {
                result.error(2, "`default_locale` is required when `locales` is present");
            }
            _ => {}
        }

        for (code, entry) in &manifest.locales {
            if !is_valid_locale_code(code) {
                result.error(2, format!("Locale '{}' is not a valid locale code", code));
            }

            if entry.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                result.error(2, format!("Locale '{}' declares an empty `name`", code));
            }
        }

        if let Some(default_locale) = manifest.default_locale.as_deref() {
            if manifest.locales.contains_key(default_locale) {
                result.warning(
                    2,
                    format!(
                        "`locales` repeats the default locale '{}'; root-level values take precedence",
                        default_locale
                    ),
                );
            }
        }
    }

    fn check_developer(manifest: &Manifest, result: &mut ValidationResult) {
        let Some(developer) = &manifest.developer else {
            return;
        };

        if developer.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            result.error(2, "`developer.name` must not be empty");
        }

        if let Some(url) = developer.url.as_deref() {
            if url::Url::parse(url).is_err() {
                result.error(2, format!("`developer.url` '{}' is not a valid URL", url));
            }
        }
    }
}

#[async_trait]
impl ManifestValidator for RulesValidator {
    async fn validate(&self, body: &[u8], context: &ValidationContext) -> anyhow::Result<ValidationResult> {
        Ok(Self::check(body, context))
    }
}

/// Check a locale code: well-formed tag with a known ISO 639 primary language
pub fn is_valid_locale_code(code: &str) -> bool {
    let Some(captures) = LOCALE_CODE_REGEX.captures(code) else {
        return false;
    };

    let language = captures[1].to_lowercase();
    match language.len() {
        2 => Language::from_639_1(&language).is_some(),
        3 => Language::from_639_3(&language).is_some(),
        _ => false,
    }
}
