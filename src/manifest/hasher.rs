/*!
 * Content hashing for fetched manifests.
 *
 * The hash is only an equality oracle against the hash stored on the app's
 * latest file; it is never parsed back.
 */

use sha2::{Digest, Sha256};

/// Algorithm prefix of every hash this module produces
pub const HASH_ALGORITHM: &str = "sha256";

/// Compute the `sha256:<hex>` digest of the exact bytes fetched
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{}:{:x}", HASH_ALGORITHM, hasher.finalize())
}
