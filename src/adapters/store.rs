//! Store abstraction traits
//!
//! This module defines the contracts the pipeline uses to talk to a backing
//! document store. The source side reads pages keyed by record id; the sink
//! side writes batches. A concrete store may implement one or both.

use crate::domain::errors::StoreError;
use crate::domain::ids::RecordId;
use crate::domain::record::{Record, RecordFilter};
use async_trait::async_trait;

/// Result type for store adapter operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of a bulk insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertOutcome {
    /// Number of records the store accepted
    pub inserted_count: u64,
}

impl InsertOutcome {
    /// Creates an outcome for `inserted_count` records
    pub fn new(inserted_count: u64) -> Self {
        Self { inserted_count }
    }
}

/// Read side of a document store
///
/// Implementations must return records in ascending id order so that the
/// cursor can resume with keyset pagination.
#[async_trait]
pub trait RecordReader: Send + Sync {
    /// Fetch up to `page_size` records with `id > after` that match `filter`
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying query fails.
    async fn fetch_page(
        &self,
        filter: &RecordFilter,
        after: Option<RecordId>,
        page_size: usize,
    ) -> StoreResult<Vec<Record>>;

    /// Count records matching `filter`
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying query fails.
    async fn count(&self, filter: &RecordFilter) -> StoreResult<u64>;

    /// Human-readable name for logs
    fn describe(&self) -> String;
}

/// Write side of a document store
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Persist a batch of records
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] when a record id already exists,
    /// and any other variant for other failures.
    async fn insert_many(&self, records: &[Record]) -> StoreResult<InsertOutcome>;

    /// Human-readable name for logs
    fn describe(&self) -> String;
}
