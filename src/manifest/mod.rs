/*!
 * Manifest handling: retrieval, hashing, parsing, validation and diffing.
 *
 * - `fetcher`: HTTP retrieval with timeout and error classification
 * - `hasher`: content hash used as the change oracle
 * - `model`: typed manifest document
 * - `validator`: validation boundary and the built-in rule set
 * - `differ`: change-set computation between two manifests
 */

pub mod fetcher;
pub mod hasher;
pub mod model;
pub mod validator;
pub mod differ;

// Re-export main types
pub use differ::{ChangeSet, DiffFallback, ManifestDiff, ManifestDiffer};
pub use fetcher::{FetchedManifest, HttpManifestFetcher, ManifestFetcher};
pub use hasher::content_hash;
pub use model::Manifest;
pub use validator::{ManifestValidator, RulesValidator, ValidationContext, ValidationResult};
