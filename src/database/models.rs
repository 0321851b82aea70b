/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse, public release status of an app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppStatus {
    /// No version, or no version with any file
    Incomplete,
    /// Files exist but none is approved
    AwaitingReview,
    /// Approved for limited (unlisted) distribution
    ApprovedLimited,
    /// Approved and publicly listed
    ApprovedFull,
    /// Rejected by a reviewer
    Rejected,
    /// Disabled by the developer or an admin
    Disabled,
    /// Blocked by an admin
    Blocked,
}

impl AppStatus {
    /// All states, in declaration order
    pub const ALL: [AppStatus; 7] = [
        AppStatus::Incomplete,
        AppStatus::AwaitingReview,
        AppStatus::ApprovedLimited,
        AppStatus::ApprovedFull,
        AppStatus::Rejected,
        AppStatus::Disabled,
        AppStatus::Blocked,
    ];

    /// Whether the app has passed review in either flavour
    pub fn is_approved(&self) -> bool {
        matches!(self, AppStatus::ApprovedLimited | AppStatus::ApprovedFull)
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppStatus::Incomplete => write!(f, "incomplete"),
            AppStatus::AwaitingReview => write!(f, "awaiting-review"),
            AppStatus::ApprovedLimited => write!(f, "approved-limited"),
            AppStatus::ApprovedFull => write!(f, "approved-full"),
            AppStatus::Rejected => write!(f, "rejected"),
            AppStatus::Disabled => write!(f, "disabled"),
            AppStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for AppStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incomplete" => Ok(AppStatus::Incomplete),
            "awaiting-review" => Ok(AppStatus::AwaitingReview),
            "approved-limited" => Ok(AppStatus::ApprovedLimited),
            "approved-full" => Ok(AppStatus::ApprovedFull),
            "rejected" => Ok(AppStatus::Rejected),
            "disabled" => Ok(AppStatus::Disabled),
            "blocked" => Ok(AppStatus::Blocked),
            _ => Err(anyhow::anyhow!("Invalid app status: {}", s)),
        }
    }
}

/// Per-file review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileStatus {
    /// Waiting for a reviewer
    Pending,
    /// Approved for limited distribution
    ApprovedLimited,
    /// Approved for public listing
    ApprovedFull,
    /// Rejected by a reviewer
    Rejected,
    /// Disabled
    Disabled,
}

impl FileStatus {
    /// All file statuses, in declaration order
    pub const ALL: [FileStatus; 5] = [
        FileStatus::Pending,
        FileStatus::ApprovedLimited,
        FileStatus::ApprovedFull,
        FileStatus::Rejected,
        FileStatus::Disabled,
    ];
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Pending => write!(f, "pending"),
            FileStatus::ApprovedLimited => write!(f, "approved-limited"),
            FileStatus::ApprovedFull => write!(f, "approved-full"),
            FileStatus::Rejected => write!(f, "rejected"),
            FileStatus::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for FileStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(FileStatus::Pending),
            "approved-limited" => Ok(FileStatus::ApprovedLimited),
            "approved-full" => Ok(FileStatus::ApprovedFull),
            "rejected" => Ok(FileStatus::Rejected),
            "disabled" => Ok(FileStatus::Disabled),
            _ => Err(anyhow::anyhow!("Invalid file status: {}", s)),
        }
    }
}

/// Why an app was put in front of a human reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// Name or locale names changed on an approved app
    ManifestChange,
    /// Fetching the manifest failed too many times in a row
    ManifestUnreachable,
    /// The manifest was fetched but did not validate
    InvalidManifest,
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewReason::ManifestChange => write!(f, "manifest_change"),
            ReviewReason::ManifestUnreachable => write!(f, "manifest_unreachable"),
            ReviewReason::InvalidManifest => write!(f, "invalid_manifest"),
        }
    }
}

impl std::str::FromStr for ReviewReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manifest_change" => Ok(ReviewReason::ManifestChange),
            "manifest_unreachable" => Ok(ReviewReason::ManifestUnreachable),
            "invalid_manifest" => Ok(ReviewReason::InvalidManifest),
            _ => Err(anyhow::anyhow!("Invalid review reason: {}", s)),
        }
    }
}

/// App record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRecord {
    /// App identifier
    pub id: i64,
    /// Developer-declared manifest URL
    pub manifest_url: String,
    /// Default locale of the app's translated fields
    pub default_locale: String,
    /// Developer-facing name
    pub name: String,
    /// Account identity of the submitter, used when the manifest has no developer block
    pub author: String,
    /// Packaged (true) or hosted (false)
    pub is_packaged: bool,
    /// Coarse release status
    pub status: AppStatus,
    /// Rating authority submission id
    pub iarc_submission_id: Option<String>,
    /// Rating authority security code
    pub iarc_security_code: Option<String>,
    /// Interactive elements declared to the rating authority
    pub interactive_elements: Vec<String>,
    /// Last time a reconciliation cycle looked at the manifest (ISO 8601)
    pub last_manifest_check_at: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Last update timestamp (ISO 8601)
    pub updated_at: String,
}

impl AppRecord {
    /// Create a new hosted app record in the `incomplete` state
    pub fn new(id: i64, manifest_url: String, name: String, author: String, default_locale: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            manifest_url,
            default_locale,
            name,
            author,
            is_packaged: false,
            status: AppStatus::Incomplete,
            iarc_submission_id: None,
            iarc_security_code: None,
            interactive_elements: Vec::new(),
            last_manifest_check_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Mark the app as packaged
    pub fn packaged(mut self) -> Self {
        self.is_packaged = true;
        self
    }

    /// Set the rating authority credentials
    pub fn with_iarc(mut self, submission_id: impl Into<String>, security_code: impl Into<String>) -> Self {
        self.iarc_submission_id = Some(submission_id.into());
        self.iarc_security_code = Some(security_code.into());
        self
    }
}

/// Version record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Version identifier
    pub id: i64,
    /// Owning app
    pub app_id: i64,
    /// Version string
    pub version: String,
    /// Release notes
    pub release_notes: Option<String>,
    /// Developer name as declared in the manifest
    pub developer_name: String,
    /// Nomination timestamp; set once, never reset
    pub nominated_at: Option<String>,
    /// Locales the version declares
    pub supported_locales: Vec<String>,
    /// Manifest document this version was built from
    pub manifest_json: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

/// File record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// File identifier
    pub id: i64,
    /// Owning version
    pub version_id: i64,
    /// Content hash (`algorithm:hex`)
    pub hash: String,
    /// Platform or package variant label
    pub platform: String,
    /// Review status
    pub status: FileStatus,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

/// Localized text of one field of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// Owning entity kind ("app", "version")
    pub owner_kind: String,
    /// Owning entity id
    pub owner_id: i64,
    /// Field name ("name", "description")
    pub field: String,
    /// Locale code
    pub locale: String,
    /// Localized text
    pub text: String,
}

/// Consecutive fetch failure bookkeeping for one app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    /// App identifier
    pub app_id: i64,
    /// Consecutive fetch failures
    pub failure_count: u32,
    /// Last attempt (unix seconds), if any
    pub last_attempt_at: Option<i64>,
    /// Optimistic concurrency revision
    pub revision: i64,
}

impl RetryState {
    /// A fresh state with no failures
    pub fn new(app_id: i64) -> Self {
        Self {
            app_id,
            failure_count: 0,
            last_attempt_at: None,
            revision: 0,
        }
    }
}

/// A retry waiting for its due time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledRetry {
    /// App identifier
    pub app_id: i64,
    /// Failure count the retry was scheduled with
    pub failure_count: u32,
    /// Due time (unix milliseconds)
    pub due_at_ms: i64,
}

/// Entry in the human review queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueueEntry {
    /// Queue entry identifier
    #[serde(skip_serializing)]
    pub id: i64,
    /// Flagged app
    pub app_id: i64,
    /// Reason code
    pub reason_code: ReviewReason,
    /// Free-text message for the reviewer
    pub message: String,
    /// Flag timestamp (ISO 8601)
    pub flagged_at: String,
}

/// A developer listed on an app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDeveloperRecord {
    /// App identifier
    pub app_id: i64,
    /// Email address
    pub email: String,
    /// Preferred locale for emails
    pub locale: String,
}

/// Rating assigned to an app by one rating body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRatingRecord {
    /// App identifier
    pub app_id: i64,
    /// Rating body ("ESRB", "PEGI", "USK", "CLASSIND", "GENERIC")
    pub rating_body: String,
    /// Rating label within that body
    pub rating: String,
    /// Content descriptors
    pub descriptors: Vec<String>,
}

/// Stored validator output, linked from validation failure emails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReportRecord {
    /// Report identifier (UUID)
    pub id: String,
    /// App identifier
    pub app_id: i64,
    /// Serialized validation result
    pub report_json: String,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}
