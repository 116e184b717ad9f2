use std::collections::HashSet;

use tracing::debug;

use crate::domain::SequenceRecord;

/// Order-preserving filter that keeps the first record seen for each name.
///
/// A mature peptide cut out of a polyprotein is often also present in the
/// input as its own record, so this runs over the whole batch.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
    dropped: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, record: SequenceRecord) -> Option<SequenceRecord> {
        if self.seen.insert(record.name.clone()) {
            Some(record)
        } else {
            debug!(name = %record.name, "dropping duplicate record");
            self.dropped += 1;
            None
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

pub fn dedup_records(records: Vec<SequenceRecord>) -> Vec<SequenceRecord> {
    let mut dedup = Deduplicator::new();
    records
        .into_iter()
        .filter_map(|record| dedup.admit(record))
        .collect()
}
