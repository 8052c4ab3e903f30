/*!
 * Run persistence for batch translations.
 *
 * This module provides:
 * - The `BatchStore` trait, one artifact per processed batch
 * - A JSON directory store (`batch_<sequence>.json` plus `manifest.json`)
 * - An in-memory store for tests
 * - The run manifest tying persisted batches to their input
 */

pub mod models;
pub mod store;

// Re-export main types
pub use models::RunManifest;
pub use store::{BatchStore, JsonBatchStore, MemoryBatchStore};
