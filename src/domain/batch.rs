//! Batch domain model
//!
//! A [`Batch`] is an ordered, bounded group of records handed from the
//! accumulator to the sink as a single unit.

use super::record::Record;

/// Ordered group of processed records
///
/// The accumulator builds a batch and moves it to the sink, so ownership of
/// the records transfers with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    sequence: u64,
    records: Vec<Record>,
}

impl Batch {
    /// Creates a batch with the given sequence number
    pub fn new(sequence: u64, records: Vec<Record>) -> Self {
        Self { sequence, records }
    }

    /// Sequence number of this batch within the run (starting at 0)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of records in the batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrows the records
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the batch and returns its records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Id range covered by the batch, as `(first, last)`
    pub fn id_range(&self) -> Option<(u64, u64)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.id.get(), last.id.get())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{Category, RecordBuilder};

    #[test]
    fn test_batch_accessors() {
        let records: Vec<Record> = (1..=3)
            .map(|id| {
                RecordBuilder::new()
                    .id(id)
                    .value(1.0)
                    .category(Category::A)
                    .build()
                    .unwrap()
            })
            .collect();

        let batch = Batch::new(2, records);
        assert_eq!(batch.sequence(), 2);
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        assert_eq!(batch.id_range(), Some((1, 3)));
        assert_eq!(batch.into_records().len(), 3);
    }

    #[test]
    fn test_empty_batch() {
        let batch = Batch::new(0, Vec::new());
        assert!(batch.is_empty());
        assert_eq!(batch.id_range(), None);
    }
}
