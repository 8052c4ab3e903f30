/*!
 * Run-level metadata stored next to the batch artifacts.
 */

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the input and target language a batch directory belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Run ID
    pub run_id: String,
    /// SHA-256 of the source records
    pub source_fingerprint: String,
    /// Target language name
    pub target_language: String,
    /// Number of source records
    pub record_count: usize,
    /// Creation time (RFC 3339)
    pub created_at: String,
}

impl RunManifest {
    /// Create a manifest for a new run
    pub fn new(source_fingerprint: impl Into<String>, target_language: impl Into<String>, record_count: usize) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            source_fingerprint: source_fingerprint.into(),
            target_language: target_language.into(),
            record_count,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Describe why `self` cannot be resumed for the given input, if it cannot
    pub fn mismatch(&self, source_fingerprint: &str, target_language: &str) -> Option<String> {
        if self.source_fingerprint != source_fingerprint {
            Some("input records differ from the ones the batches were produced for".to_string())
        } else if !self.target_language.eq_ignore_ascii_case(target_language) {
            Some(format!(
                "batches were translated to {}, not {}",
                self.target_language, target_language
            ))
        } else {
            None
        }
    }
}
