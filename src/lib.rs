/*!
 * # manifest-sync - Manifest reconciliation for an app marketplace
 *
 * Hosted apps describe themselves in a manifest served from the developer's
 * own URL. This library keeps the catalog consistent with those manifests.
 *
 * ## Features
 *
 * - Periodic re-fetch of every hosted app's manifest over a worker pool
 * - Content-hash short-circuit for unchanged manifests
 * - Tiered manifest validation with stored, linkable reports
 * - Field-level diffing of names, developer and localized metadata
 * - Transactional version/file/translation updates
 * - Release status recomputation from the app's file statuses
 * - Failure counting, developer notifications and review escalation
 * - Rating authority (storefront) synchronization for approved apps
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `errors`: Custom error types for the application
 * - `database`: SQLite persistence of the catalog and pipeline state
 * - `manifest`: Fetching, hashing, validating and diffing manifests
 * - `pipeline`: The reconciliation cycle and everything it drives:
 *   - `pipeline::reconciler`: One cycle for one app
 *   - `pipeline::mutator`: Transactional catalog writes
 *   - `pipeline::status`: Release status state machine
 *   - `pipeline::retry`: Retry and escalation decisions
 *   - `pipeline::scheduler`: Batches, worker pool and delayed retries
 * - `integrations`: Developer notifications and the storefront client
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod errors;
pub mod database;
pub mod manifest;
pub mod pipeline;
pub mod integrations;

// Re-export main types for easier usage
pub use app_config::Config;
pub use database::{DatabaseConnection, Repository};
pub use errors::{AppError, FetchError, PipelineError};
pub use manifest::{content_hash, ChangeSet, Manifest, ValidationResult};
pub use pipeline::{CycleOutcome, CycleResult, Reconciler, Scheduler, StatusStateMachine};
