/*!
 * Database module for persistent storage of the catalog and pipeline state.
 *
 * This module provides SQLite-based persistence for:
 * - Apps, versions, files and their translations
 * - Consecutive fetch failure bookkeeping (retry state)
 * - The human review queue and stored validation reports
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::{NewVersion, Repository};
