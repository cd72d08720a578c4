//! In-memory document store
//!
//! An ordered map of records keyed by id. It implements both store contracts
//! and is used for local runs, seeding demos and tests. The bulk insert
//! behaves like an ordered bulk write: records go in one by one until the
//! first duplicate id, which aborts the rest of the batch.

use crate::adapters::store::{InsertOutcome, RecordReader, RecordWriter, StoreResult};
use crate::domain::errors::StoreError;
use crate::domain::ids::RecordId;
use crate::domain::record::{Record, RecordFilter};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::RwLock;

/// Document store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    name: String,
    documents: RwLock<BTreeMap<RecordId, Record>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store pre-populated with records
    ///
    /// Later records with the same id replace earlier ones.
    pub fn with_records(name: impl Into<String>, records: impl IntoIterator<Item = Record>) -> Self {
        let documents = records.into_iter().map(|r| (r.id, r)).collect();
        Self {
            name: name.into(),
            documents: RwLock::new(documents),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns true if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Returns true if a record with this id exists
    pub async fn contains(&self, id: RecordId) -> bool {
        self.documents.read().await.contains_key(&id)
    }

    /// Snapshot of all stored records in id order
    pub async fn snapshot(&self) -> Vec<Record> {
        self.documents.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl RecordReader for InMemoryStore {
    async fn fetch_page(
        &self,
        filter: &RecordFilter,
        after: Option<RecordId>,
        page_size: usize,
    ) -> StoreResult<Vec<Record>> {
        let documents = self.documents.read().await;
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };

        Ok(documents
            .range((lower, Bound::Unbounded))
            .map(|(_, record)| record)
            .filter(|record| filter.matches(record))
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &RecordFilter) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        Ok(documents.values().filter(|r| filter.matches(r)).count() as u64)
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}

#[async_trait]
impl RecordWriter for InMemoryStore {
    async fn insert_many(&self, records: &[Record]) -> StoreResult<InsertOutcome> {
        let mut documents = self.documents.write().await;
        let mut inserted = 0u64;

        for record in records {
            if documents.contains_key(&record.id) {
                return Err(StoreError::DuplicateKey {
                    message: format!("record id {} already exists in '{}'", record.id, self.name),
                    inserted_before_conflict: Some(inserted),
                });
            }
            documents.insert(record.id, record.clone());
            inserted += 1;
        }

        Ok(InsertOutcome::new(inserted))
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{Category, RecordBuilder};

    fn record(id: u64, category: Category) -> Record {
        RecordBuilder::new()
            .id(id)
            .value(id as f64)
            .category(category)
            .build()
            .unwrap()
    }

    fn seeded(n: u64) -> InMemoryStore {
        InMemoryStore::with_records(
            "test",
            (1..=n).map(|id| record(id, Category::ALL[(id % 4) as usize])),
        )
    }

    #[tokio::test]
    async fn test_fetch_page_keyset() {
        let store = seeded(10);
        let filter = RecordFilter::all();

        let first = store.fetch_page(&filter, None, 4).await.unwrap();
        let ids: Vec<u64> = first.iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let after = first.last().map(|r| r.id);
        let second = store.fetch_page(&filter, after, 4).await.unwrap();
        let ids: Vec<u64> = second.iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![5, 6, 7, 8]);

        let last = store
            .fetch_page(&filter, Some(RecordId::new(8).unwrap()), 4)
            .await
            .unwrap();
        assert_eq!(last.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_page_with_filter() {
        let store = seeded(12);
        let filter = RecordFilter::all().with_category(Category::B);

        let page = store.fetch_page(&filter, None, 100).await.unwrap();
        assert!(page.iter().all(|r| r.category == Category::B));
        assert_eq!(store.count(&filter).await.unwrap(), page.len() as u64);
    }

    #[tokio::test]
    async fn test_insert_many() {
        let store = InMemoryStore::new("sink");
        let outcome = store
            .insert_many(&[record(1, Category::A), record(2, Category::B)])
            .await
            .unwrap();

        assert_eq!(outcome.inserted_count, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_insert_many_duplicate_stops_at_conflict() {
        let store = InMemoryStore::with_records("sink", [record(3, Category::A)]);
        let err = store
            .insert_many(&[
                record(1, Category::A),
                record(2, Category::A),
                record(3, Category::A),
                record(4, Category::A),
            ])
            .await
            .unwrap_err();

        match err {
            StoreError::DuplicateKey {
                inserted_before_conflict,
                ..
            } => assert_eq!(inserted_before_conflict, Some(2)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.contains(RecordId::new(2).unwrap()).await);
        assert!(!store.contains(RecordId::new(4).unwrap()).await);
    }
}
