/*!
 * Merging of per-batch results into one id-keyed collection.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dataset::SourceSet;
use crate::translation::batch::BatchResult;

/// Accepted translation of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedRecord {
    pub id: u64,
    pub translated_text: String,
}

impl TranslatedRecord {
    pub fn new(id: u64, translated_text: impl Into<String>) -> Self {
        Self {
            id,
            translated_text: translated_text.into(),
        }
    }
}

/// All translations accepted so far, keyed by record id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedSet {
    entries: HashMap<u64, TranslatedRecord>,
}

impl AggregatedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: u64) -> Option<&TranslatedRecord> {
        self.entries.get(&id)
    }

    /// Insert or overwrite
    pub fn insert(&mut self, record: TranslatedRecord) {
        self.entries.insert(record.id, record);
    }

    /// Translations ordered like the source records. Ids unknown to the
    /// source are left out.
    pub fn in_source_order(&self, source: &SourceSet) -> Vec<TranslatedRecord> {
        source
            .iter()
            .filter_map(|record| self.entries.get(&record.id).cloned())
            .collect()
    }
}

/// Folds batch results into an `AggregatedSet`
pub struct Aggregator;

impl Aggregator {
    /// Merge one batch result, in emission order. Later entries win.
    pub fn merge(mut set: AggregatedSet, result: &BatchResult) -> AggregatedSet {
        for entry in &result.entries {
            set.insert(entry.clone());
        }
        set
    }

    /// Merge several batch results in (pass, sequence) order
    pub fn merge_all<'a, I>(set: AggregatedSet, results: I) -> AggregatedSet
    where
        I: IntoIterator<Item = &'a BatchResult>,
    {
        let mut ordered: Vec<&BatchResult> = results.into_iter().collect();
        ordered.sort_by_key(|r| (r.pass, r.sequence));
        ordered.into_iter().fold(set, Self::merge)
    }
}
