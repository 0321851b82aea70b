use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Database file path; defaults to the user's local data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Manifest fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry and escalation thresholds
    #[serde(default)]
    pub retry: RetryConfig,

    /// Batch scheduling settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Rating authority settings
    #[serde(default)]
    pub storefront: StorefrontConfig,

    /// Developer notification settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Manifest fetch configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchConfig {
    /// Overall request timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Largest manifest body accepted, in bytes
    #[serde(default = "default_max_manifest_bytes")]
    pub max_manifest_bytes: usize,

    /// User-Agent header sent with every fetch
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_manifest_bytes: default_max_manifest_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for consecutive fetch failures
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    /// Failure count at which the developers are emailed
    #[serde(default = "default_notify_after")]
    pub notify_after: u32,

    /// Failure count at which the app is handed to reviewers
    #[serde(default = "default_escalate_after")]
    pub escalate_after: u32,

    /// Fixed delay before a failed fetch is retried, in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            notify_after: default_notify_after(),
            escalate_after: default_escalate_after(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

/// Periodic batch scheduling configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Seconds between two full passes over the hosted apps
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Number of app ids per dispatched batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum number of apps reconciled at the same time
    #[serde(default = "default_concurrent_workers")]
    pub concurrent_workers: usize,

    /// Also reconcile packaged apps (their manifests change with each upload)
    #[serde(default)]
    pub include_packaged: bool,

    /// Milliseconds between two checks for due retries
    #[serde(default = "default_retry_poll_ms")]
    pub retry_poll_ms: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_poll_interval(&self) -> Duration {
        Duration::from_millis(self.retry_poll_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
            concurrent_workers: default_concurrent_workers(),
            include_packaged: false,
            retry_poll_ms: default_retry_poll_ms(),
        }
    }
}

/// Content rating authority (storefront sync) configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorefrontConfig {
    /// Whether identity changes are pushed at all
    #[serde(default)]
    pub enabled: bool,

    /// Endpoint receiving storefront updates
    #[serde(default = "default_storefront_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_integration_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_storefront_endpoint(),
            timeout_secs: default_integration_timeout_secs(),
        }
    }
}

/// How notification emails leave the process
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailRelayKind {
    /// Write messages to the log only
    #[default]
    Log,
    /// POST messages to an HTTP mail relay
    Http,
}

/// Developer notification configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotifierConfig {
    /// Relay used to deliver messages
    #[serde(default)]
    pub relay: MailRelayKind,

    /// HTTP relay endpoint (used when `relay` is `http`)
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// Sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Base URL of the validation report pages linked from emails
    #[serde(default = "default_validation_report_base_url")]
    pub validation_report_base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_integration_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            relay: MailRelayKind::default(),
            endpoint: String::new(),
            from_address: default_from_address(),
            validation_report_base_url: default_validation_report_base_url(),
            timeout_secs: default_integration_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_manifest_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_user_agent() -> String {
    format!("manifest-sync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_notify_after() -> u32 {
    3
}

fn default_escalate_after() -> u32 {
    4
}

fn default_retry_delay_secs() -> u64 {
    3600
}

fn default_interval_secs() -> u64 {
    86_400
}

fn default_batch_size() -> usize {
    50
}

fn default_concurrent_workers() -> usize {
    4
}

fn default_retry_poll_ms() -> u64 {
    30_000
}

fn default_storefront_endpoint() -> String {
    "https://www.globalratings.com/iarcprodservice/storefront".to_string()
}

fn default_integration_timeout_secs() -> u64 {
    30
}

fn default_from_address() -> String {
    "nobody@marketplace.local".to_string()
}

fn default_validation_report_base_url() -> String {
    "https://marketplace.local/developers/validation".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.timeout_secs == 0 {
            return Err(anyhow!("fetch.timeout_secs must be greater than zero"));
        }

        if self.fetch.max_manifest_bytes == 0 {
            return Err(anyhow!("fetch.max_manifest_bytes must be greater than zero"));
        }

        if self.retry.notify_after == 0 || self.retry.notify_after >= self.retry.escalate_after {
            return Err(anyhow!(
                "retry.notify_after ({}) must be non-zero and lower than retry.escalate_after ({})",
                self.retry.notify_after,
                self.retry.escalate_after
            ));
        }

        if self.scheduler.concurrent_workers == 0 || self.scheduler.batch_size == 0 {
            return Err(anyhow!("scheduler.concurrent_workers and scheduler.batch_size must be greater than zero"));
        }

        if self.scheduler.retry_poll_ms == 0 {
            return Err(anyhow!("scheduler.retry_poll_ms must be greater than zero"));
        }

        if self.storefront.enabled {
            url::Url::parse(&self.storefront.endpoint)
                .map_err(|e| anyhow!("Invalid storefront endpoint '{}': {}", self.storefront.endpoint, e))?;
        }

        if self.notifier.relay == MailRelayKind::Http {
            url::Url::parse(&self.notifier.endpoint)
                .map_err(|e| anyhow!("Invalid notifier endpoint '{}': {}", self.notifier.endpoint, e))?;
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: None,
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
            scheduler: SchedulerConfig::default(),
            storefront: StorefrontConfig::default(),
            notifier: NotifierConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
