/*!
 * Detection of source records that still lack a translation.
 */

use crate::dataset::{Record, SourceSet};
use crate::translation::aggregate::AggregatedSet;

/// Records without an accepted translation, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapSet {
    records: Vec<Record>,
}

impl GapSet {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.id).collect()
    }
}

pub struct GapFinder;

impl GapFinder {
    /// Source records whose id is absent from `aggregated`. Always computed
    /// against the full source, never against a previous gap.
    pub fn find(source: &SourceSet, aggregated: &AggregatedSet) -> GapSet {
        GapSet {
            records: source
                .iter()
                .filter(|record| !aggregated.contains(record.id))
                .cloned()
                .collect(),
        }
    }
}
