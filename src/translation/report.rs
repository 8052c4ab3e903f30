/*!
 * Final output document of a run.
 */

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::file_utils::FileManager;

use super::aggregate::TranslatedRecord;
use super::convergence::{RunOutcome, RunStatus, StallReason};

/// Contents of the final output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalOutput {
    /// "done" or "stalled"
    pub status: String,
    /// "no_progress" or "pass_limit" when stalled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stall_reason: Option<String>,
    pub target_language: String,
    pub passes: u32,
    pub total_records: usize,
    /// Translations in source order
    pub translations: Vec<TranslatedRecord>,
    /// Ids without a translation, in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_ids: Vec<u64>,
}

impl FinalOutput {
    pub fn from_outcome(outcome: &RunOutcome, target_language: &str) -> Self {
        let (status, stall_reason) = match outcome.status {
            RunStatus::Done => ("done", None),
            RunStatus::Stalled(StallReason::NoProgress) => ("stalled", Some("no_progress")),
            RunStatus::Stalled(StallReason::PassLimit) => ("stalled", Some("pass_limit")),
        };

        Self {
            status: status.to_string(),
            stall_reason: stall_reason.map(str::to_string),
            target_language: target_language.to_string(),
            passes: outcome.passes,
            total_records: outcome.translations.len() + outcome.unresolved.len(),
            translations: outcome.translations.clone(),
            unresolved_ids: outcome.unresolved.clone(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == "done"
    }

    /// Write the output as pretty JSON
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        FileManager::write_json(path, self)
    }
}
